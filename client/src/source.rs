use crate::error::ClientError;
use crate::point::Point;
use crate::query::SeriesQuery;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Anything that can answer the dashboard's two reads.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Signal names seen within `lookback`, in the order the store returns them.
    async fn signal_names(&self, lookback: Duration) -> Result<Vec<String>, ClientError>;

    async fn series(&self, query: &SeriesQuery) -> Result<Vec<Point>, ClientError>;
}

#[async_trait]
impl<T: TelemetrySource + ?Sized> TelemetrySource for Arc<T> {
    async fn signal_names(&self, lookback: Duration) -> Result<Vec<String>, ClientError> {
        (**self).signal_names(lookback).await
    }

    async fn series(&self, query: &SeriesQuery) -> Result<Vec<Point>, ClientError> {
        (**self).series(query).await
    }
}
