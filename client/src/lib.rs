//! Client for the InfluxDB v2 Flux query API, specialised for CAN-bus
//! telemetry: every reading lives in one measurement, tagged with the signal
//! name it was decoded from.
//!
//! ```rust,ignore
//! use telemetry_client::{InfluxConfig, QueryClient, SchemaConfig, SeriesQuery};
//!
//! let client = QueryClient::new(InfluxConfig::from_env(), SchemaConfig::default())?;
//! let names = client.fetch_signal_names(client.schema().default_lookback()).await?;
//! let points = client.fetch_series(&SeriesQuery::live(&names[0], 60)).await?;
//! ```

pub mod client;
pub mod config;
pub mod csv;
pub mod error;
pub mod point;
pub mod query;
pub mod source;

pub use client::QueryClient;
pub use config::{InfluxConfig, SchemaConfig};
pub use csv::{parse_distinct, parse_series, parse_series_points, RejectReason, RejectedRow, SeriesParse};
pub use error::{ClientError, QueryBuildError};
pub use point::Point;
pub use query::{Aggregation, FluxBuilder, SeriesQuery, Window};
pub use source::TelemetrySource;
