use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use telemetry_client::{Aggregation, ClientError, Point, SeriesQuery, TelemetrySource, Window};

/// Offline stand-in for the store: a fixed signal list and a deterministic
/// zig-zag walk per signal, so `--demo` looks alive without a server.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    signals: Vec<String>,
    /// Cap on points per answer, whatever the window.
    max_points: usize,
}

const DEMO_SIGNALS: [&str; 8] = [
    "WheelSpeedFL",
    "WheelSpeedFR",
    "WheelSpeedRL",
    "WheelSpeedRR",
    "INV_Motor_Temp",
    "INV_DC_Bus_Voltage",
    "BMS_Pack_SOC",
    "Steering_Angle",
];

const RAW_STEP_MS: i64 = 100;

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(DEMO_SIGNALS.iter().map(|s| s.to_string()))
    }
}

impl SyntheticSource {
    pub fn new(signals: impl IntoIterator<Item = String>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
            max_points: 5_000,
        }
    }

    /// Value of `signal` at sample index `n`: a triangle walk that flips
    /// direction every 17 samples, plus a small 25-sample ripple.
    pub fn sample(signal: &str, n: i64) -> f64 {
        let seed = signal.bytes().fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let base = 20.0 + (seed % 80) as f64;
        let step = 0.25 + (seed % 4) as f64 * 0.25;

        let phase = (n + (seed % 34) as i64).rem_euclid(34);
        let leg = if phase < 17 { phase } else { 34 - phase };
        let ripple = (n.rem_euclid(25)) as f64 * 0.02;
        base + step * leg as f64 + ripple
    }

    fn series_between(&self, signal: &str, start_ms: i64, stop_ms: i64, step_ms: i64) -> Vec<Point> {
        let first = start_ms.saturating_add(step_ms - 1).div_euclid(step_ms).saturating_mul(step_ms);
        (0..)
            .map_while(|i: i64| i.checked_mul(step_ms).and_then(|offset| first.checked_add(offset)))
            .take_while(|t| *t < stop_ms)
            .take(self.max_points)
            .map(|t| Point::new(t, Self::sample(signal, t / step_ms)))
            .collect()
    }
}

#[async_trait]
impl TelemetrySource for SyntheticSource {
    async fn signal_names(&self, _lookback: Duration) -> Result<Vec<String>, ClientError> {
        Ok(self.signals.clone())
    }

    async fn series(&self, query: &SeriesQuery) -> Result<Vec<Point>, ClientError> {
        if !self.signals.iter().any(|s| s == &query.signal) {
            return Ok(Vec::new());
        }
        let (start_ms, stop_ms) = match query.window {
            Window::Relative { seconds } => {
                let now = Utc::now().timestamp_millis();
                let span = i64::try_from(seconds).unwrap_or(i64::MAX).saturating_mul(1_000);
                (now.saturating_sub(span), now)
            }
            Window::Absolute { start, stop } => (start.timestamp_millis(), stop.timestamp_millis()),
        };
        let step_ms = match query.aggregation {
            Aggregation::Raw => RAW_STEP_MS,
            Aggregation::Mean { every_secs } => i64::try_from(every_secs.max(1))
                .unwrap_or(i64::MAX)
                .saturating_mul(1_000),
        };
        Ok(self.series_between(&query.signal, start_ms, stop_ms, step_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn samples_are_deterministic_and_bounded_steps() {
        for n in 0..100 {
            assert_eq!(
                SyntheticSource::sample("INV_Motor_Temp", n),
                SyntheticSource::sample("INV_Motor_Temp", n)
            );
        }
        let a = SyntheticSource::sample("WheelSpeedFL", 3);
        let b = SyntheticSource::sample("WheelSpeedFL", 4);
        assert!((a - b).abs() <= 1.5);
    }

    #[tokio::test]
    async fn live_window_yields_one_point_per_second() {
        let source = SyntheticSource::default();
        let points = source.series(&SeriesQuery::live("WheelSpeedFL", 10)).await.unwrap();
        assert_eq!(points.len(), 10);
        assert!(points.windows(2).all(|w| w[1].time - w[0].time == 1_000));
    }

    #[tokio::test]
    async fn huge_live_window_is_capped_not_overflowed() {
        let source = SyntheticSource::default();
        let points = source.series(&SeriesQuery::live("WheelSpeedFL", u64::MAX)).await.unwrap();
        assert_eq!(points.len(), 5_000);
    }

    #[tokio::test]
    async fn raw_range_is_half_open_and_unknown_signals_are_empty() {
        let source = SyntheticSource::default();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        let points = source
            .series(&SeriesQuery::raw_range("BMS_Pack_SOC", start, stop))
            .await
            .unwrap();
        assert_eq!(points.len(), 10);
        assert_eq!(points[0].time, start.timestamp_millis());
        assert!(points.iter().all(|p| p.time >= start.timestamp_millis() && p.time < stop.timestamp_millis()));

        let none = source
            .series(&SeriesQuery::raw_range("Nope", start, stop))
            .await
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(source.signal_names(Duration::from_secs(1)).await.unwrap().len(), 8);
    }
}
