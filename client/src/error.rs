use thiserror::Error;

/// Failures surfaced by [`crate::QueryClient`]. Parsing never fails; see
/// [`crate::SeriesParse`] for rows that were rejected.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, DNS, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("query failed with status {status}: {message}")]
    Query { status: u16, message: String },

    #[error("unable to build http client: {0}")]
    Http(#[source] reqwest::Error),

    #[error(transparent)]
    Build(#[from] QueryBuildError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Query { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryBuildError {
    #[error("empty signal name")]
    EmptySignal,

    #[error("window start {start} is not before stop {stop}")]
    InvertedWindow { start: String, stop: String },
}
