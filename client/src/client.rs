use crate::config::{InfluxConfig, SchemaConfig};
use crate::csv::{self, SeriesParse, VALUE_COLUMN};
use crate::error::ClientError;
use crate::point::Point;
use crate::query::{FluxBuilder, SeriesQuery};
use crate::source::TelemetrySource;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

const FLUX_CONTENT_TYPE: &str = "application/vnd.flux";
const CSV_ACCEPT: &str = "application/csv";

/// Flux-over-HTTP client. One instance per process; cloning shares the
/// connection pool.
#[derive(Debug, Clone)]
pub struct QueryClient {
    http: reqwest::Client,
    config: InfluxConfig,
    flux: FluxBuilder,
    endpoint: String,
}

impl QueryClient {
    pub fn new(config: InfluxConfig, schema: SchemaConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ClientError::Http)?;
        if config.token.is_empty() {
            log::warn!("no store token configured; queries will be sent unauthenticated");
        }
        Ok(Self {
            http,
            endpoint: config.query_endpoint(),
            config,
            flux: FluxBuilder::new(schema),
        })
    }

    pub fn flux(&self) -> &FluxBuilder {
        &self.flux
    }

    pub fn schema(&self) -> &SchemaConfig {
        self.flux.schema()
    }

    /// Send raw Flux and return the CSV body.
    pub async fn execute(&self, flux: &str) -> Result<String, ClientError> {
        log::debug!("POST {} org={}", self.endpoint, self.config.org);

        let mut request = self
            .http
            .post(&self.endpoint)
            .query(&[("org", self.config.org.as_str())])
            .header(CONTENT_TYPE, FLUX_CONTENT_TYPE)
            .header(ACCEPT, CSV_ACCEPT)
            .body(flux.to_string());
        if !self.config.token.is_empty() {
            request = request.header(AUTHORIZATION, format!("Token {}", self.config.token));
        }

        let response = request.send().await.map_err(|err| {
            record_query("transport");
            ClientError::Transport(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            record_query("status");
            return Err(ClientError::Query {
                status: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
            });
        }

        let body = response.text().await.map_err(|err| {
            record_query("transport");
            ClientError::Transport(err)
        })?;
        record_query("ok");
        Ok(body)
    }

    pub async fn fetch_signal_names(&self, lookback: Duration) -> Result<Vec<String>, ClientError> {
        let body = self.execute(&self.flux.distinct_signals(lookback)).await?;
        Ok(csv::parse_distinct(&body, VALUE_COLUMN))
    }

    pub async fn fetch_series_report(&self, query: &SeriesQuery) -> Result<SeriesParse, ClientError> {
        let flux = self.flux.series(query)?;
        let body = self.execute(&flux).await?;
        let parsed = csv::parse_series(&body);
        if !parsed.rejected.is_empty() {
            log::debug!(
                "{}: {} rows rejected while parsing",
                query.signal,
                parsed.rejected.len()
            );
        }
        Ok(parsed)
    }

    pub async fn fetch_series(&self, query: &SeriesQuery) -> Result<Vec<Point>, ClientError> {
        Ok(self.fetch_series_report(query).await?.points)
    }
}

#[async_trait]
impl TelemetrySource for QueryClient {
    async fn signal_names(&self, lookback: Duration) -> Result<Vec<String>, ClientError> {
        self.fetch_signal_names(lookback).await
    }

    async fn series(&self, query: &SeriesQuery) -> Result<Vec<Point>, ClientError> {
        self.fetch_series(query).await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// The store answers errors as `{"code": .., "message": ..}`; anything else is
/// passed through as text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => Some(parsed.message),
        Err(_) => Some(body.to_string()),
    }
}

#[cfg(feature = "telemetry")]
fn record_query(outcome: &'static str) {
    metrics::counter!("telemetry_client_queries_total", "outcome" => outcome).increment(1);
}

#[cfg(not(feature = "telemetry"))]
fn record_query(_outcome: &'static str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"code":"unauthorized","message":"unauthorized access"}"#).as_deref(),
            Some("unauthorized access")
        );
        assert_eq!(error_message("bad gateway\n").as_deref(), Some("bad gateway"));
        assert_eq!(error_message("  "), None);
    }
}
