//! Flux text for the two reads the dashboard needs: the distinct signal list
//! and a windowed series for one signal.

use crate::config::SchemaConfig;
use crate::error::QueryBuildError;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::time::Duration;
use strum::IntoStaticStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The last `seconds` seconds, relative to the server clock.
    Relative { seconds: u64 },
    /// `[start, stop)` in UTC.
    Absolute {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

impl Window {
    pub fn last_secs(seconds: u64) -> Self {
        Window::Relative { seconds }
    }

    pub fn between(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Window::Absolute { start, stop }
    }

    /// `[now - minutes, now)`, the downloader's "now minus N min" shortcut.
    pub fn last_minutes(now: DateTime<Utc>, minutes: u32) -> Self {
        Window::Absolute {
            start: now - ChronoDuration::minutes(i64::from(minutes)),
            stop: now,
        }
    }

    /// `[start, now)`; the "now" button on the range picker.
    pub fn until_now(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Window::Absolute { start, stop: now }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Aggregation {
    Raw,
    /// Mean over fixed buckets of `every_secs`, empty buckets omitted.
    Mean { every_secs: u64 },
}

impl Aggregation {
    pub fn per_second_mean() -> Self {
        Aggregation::Mean { every_secs: 1 }
    }

    pub fn yield_name(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesQuery {
    pub signal: String,
    pub window: Window,
    pub aggregation: Aggregation,
}

impl SeriesQuery {
    /// What a live chart polls: the last `seconds` seconds, 1 s means.
    pub fn live(signal: impl Into<String>, seconds: u64) -> Self {
        Self {
            signal: signal.into(),
            window: Window::last_secs(seconds),
            aggregation: Aggregation::per_second_mean(),
        }
    }

    /// What the downloader reads: an absolute range, unaggregated.
    pub fn raw_range(signal: impl Into<String>, start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self {
            signal: signal.into(),
            window: Window::between(start, stop),
            aggregation: Aggregation::Raw,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FluxBuilder {
    schema: SchemaConfig,
}

impl FluxBuilder {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    pub fn distinct_signals(&self, lookback: Duration) -> String {
        let mut q = self.head(&format!("-{}", flux_duration(lookback.as_secs())));
        let _ = writeln!(q, "  |> distinct(column: {})", flux_string(&self.schema.signal_tag));
        q.trim_end().to_string()
    }

    pub fn series(&self, query: &SeriesQuery) -> Result<String, QueryBuildError> {
        if query.signal.trim().is_empty() {
            return Err(QueryBuildError::EmptySignal);
        }
        let range = match query.window {
            Window::Relative { seconds } => format!("-{}s", seconds.max(1)),
            Window::Absolute { start, stop } => {
                if start >= stop {
                    return Err(QueryBuildError::InvertedWindow {
                        start: flux_time(start),
                        stop: flux_time(stop),
                    });
                }
                format!("{}, stop: {}", flux_time(start), flux_time(stop))
            }
        };

        let mut q = self.head(&range);
        let _ = writeln!(
            q,
            "  |> filter(fn: (r) => r[{}] == {})",
            flux_string(&self.schema.signal_tag),
            flux_string(&query.signal)
        );
        let _ = writeln!(
            q,
            "  |> filter(fn: (r) => r[\"_field\"] == {})",
            flux_string(&self.schema.field)
        );
        if let Aggregation::Mean { every_secs } = query.aggregation {
            let _ = writeln!(
                q,
                "  |> aggregateWindow(every: {}, fn: mean, createEmpty: false)",
                flux_duration(every_secs.max(1))
            );
        }
        let _ = writeln!(q, "  |> yield(name: {})", flux_string(query.aggregation.yield_name()));
        Ok(q.trim_end().to_string())
    }

    fn head(&self, range_start: &str) -> String {
        let mut q = String::new();
        let _ = writeln!(q, "from(bucket: {})", flux_string(&self.schema.bucket));
        let _ = writeln!(q, "  |> range(start: {range_start})");
        let _ = writeln!(
            q,
            "  |> filter(fn: (r) => r[\"_measurement\"] == {})",
            flux_string(&self.schema.measurement)
        );
        q
    }
}

/// Quote `raw` as a Flux string literal. Backslashes, double quotes and the
/// `${` interpolation opener are escaped, so catalog-derived names cannot
/// terminate the literal.
pub fn flux_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Largest whole unit among d/h/m/s.
pub fn flux_duration(secs: u64) -> String {
    const UNITS: &[(u64, &str)] = &[(86_400, "d"), (3_600, "h"), (60, "m")];
    for (size, unit) in UNITS {
        if secs >= *size && secs % size == 0 {
            return format!("{}{unit}", secs / size);
        }
    }
    format!("{secs}s")
}

pub fn flux_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn builder() -> FluxBuilder {
        FluxBuilder::new(SchemaConfig::default())
    }

    #[test]
    fn distinct_query_matches_catalog_shape() {
        let q = builder().distinct_signals(Duration::from_secs(86_400));
        assert_eq!(
            q,
            "from(bucket: \"ourCar\")\n  \
             |> range(start: -1d)\n  \
             |> filter(fn: (r) => r[\"_measurement\"] == \"canBus\")\n  \
             |> distinct(column: \"signalName\")"
        );
    }

    #[test]
    fn live_query_aggregates_per_second() {
        let q = builder().series(&SeriesQuery::live("INV_Phase_A_Current", 60)).unwrap();
        assert!(q.contains("|> range(start: -60s)"));
        assert!(q.contains("r[\"signalName\"] == \"INV_Phase_A_Current\""));
        assert!(q.contains("r[\"_field\"] == \"sensorReading\""));
        assert!(q.contains("aggregateWindow(every: 1s, fn: mean, createEmpty: false)"));
        assert!(q.ends_with("|> yield(name: \"mean\")"));
    }

    #[test]
    fn relative_window_never_renders_zero() {
        let q = builder().series(&SeriesQuery::live("X", 0)).unwrap();
        assert!(q.contains("range(start: -1s)"));
    }

    #[test]
    fn absolute_raw_query_uses_time_literals() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
        let q = builder().series(&SeriesQuery::raw_range("WheelSpeedFL", start, stop)).unwrap();
        assert!(q.contains("range(start: 2024-01-01T00:00:00.000Z, stop: 2024-01-01T00:05:00.000Z)"));
        assert!(!q.contains("aggregateWindow"));
        assert!(q.ends_with("|> yield(name: \"raw\")"));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = builder().series(&SeriesQuery::raw_range("X", t, t)).unwrap_err();
        assert!(matches!(err, QueryBuildError::InvertedWindow { .. }));
        assert_eq!(
            builder().series(&SeriesQuery::live("  ", 10)).unwrap_err(),
            QueryBuildError::EmptySignal
        );
    }

    #[test]
    fn signal_names_cannot_break_out_of_the_literal() {
        let hostile = r#"x") |> drop() //"#;
        let q = builder().series(&SeriesQuery::live(hostile, 10)).unwrap();
        assert!(q.contains(r#"r["signalName"] == "x\") |> drop() //""#));
        assert_eq!(flux_string(r"a\b"), r#""a\\b""#);
        assert_eq!(flux_string("${token}"), r#""\${token}""#);
        assert_eq!(flux_string("$5"), r#""$5""#);
    }

    #[test]
    fn durations_pick_largest_whole_unit() {
        assert_eq!(flux_duration(86_400), "1d");
        assert_eq!(flux_duration(7_200), "2h");
        assert_eq!(flux_duration(300), "5m");
        assert_eq!(flux_duration(90), "90s");
        assert_eq!(flux_duration(1), "1s");
    }

    #[test]
    fn last_minutes_ends_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        match Window::last_minutes(now, 5) {
            Window::Absolute { start, stop } => {
                assert_eq!(stop, now);
                assert_eq!((stop - start).num_seconds(), 300);
            }
            other => panic!("unexpected window {other:?}"),
        }
    }
}
