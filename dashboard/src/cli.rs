use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use telemetry_client::{Aggregation, SeriesQuery, Window};
use telemetry_dash::overlay::OverlayAlign;

#[derive(Debug, Parser)]
#[command(name = "telemetry-dash", version, about = "Live CAN-bus telemetry from InfluxDB")]
pub struct Cli {
    /// Config file (defaults to the per-user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the built-in synthetic source instead of the store
    #[arg(long, global = true)]
    pub demo: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List signals seen in the catalog lookback window
    Signals {
        #[arg(long, short)]
        search: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the Flux a selection would send, without sending it
    Query {
        #[arg(long, short)]
        signal: String,
        #[command(flatten)]
        time: TimeArgs,
        /// Mean buckets of this many seconds (default: 1 s for --last, raw otherwise)
        #[arg(long)]
        every: Option<u64>,
    },
    /// Fetch raw readings for a range and write them as CSV
    Download {
        #[arg(long, short)]
        signal: String,
        #[command(flatten)]
        time: TimeArgs,
        /// Target directory (default: config download_dir, else the current dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Poll charts and overlays and redraw as data arrives
    Live(LiveArgs),
    /// Build or inspect a shareable layout code
    #[command(subcommand)]
    Preset(PresetCommand),
}

#[derive(Debug, Args)]
pub struct LiveArgs {
    /// Signal to chart; repeatable
    #[arg(long = "chart")]
    pub charts: Vec<String>,
    /// Signal to overlay; repeatable
    #[arg(long = "overlay")]
    pub overlays: Vec<String>,
    /// Start from a preset code
    #[arg(long, conflicts_with = "resume")]
    pub preset: Option<String>,
    /// Start from the layout saved by the previous session
    #[arg(long)]
    pub resume: bool,
    /// Live window in seconds
    #[arg(long)]
    pub range: Option<u64>,
    #[arg(long, default_value = "index")]
    pub align: OverlayAlign,
    /// Exit after this many seconds
    #[arg(long)]
    pub for_secs: Option<u64>,
    /// Do not read commands from stdin
    #[arg(long)]
    pub no_input: bool,
}

#[derive(Debug, Subcommand)]
pub enum PresetCommand {
    Encode {
        #[arg(long, default_value_t = 60)]
        range: u64,
        #[arg(long = "chart")]
        charts: Vec<String>,
        /// `NAME` or `NAME=#rrggbb`; uncolored overlays take palette colors in order
        #[arg(long = "overlay")]
        overlays: Vec<String>,
    },
    Decode { code: String },
}

/// `--last` for a relative window; `--minutes`, or `--start` with optional
/// `--end`, for an absolute one.
#[derive(Debug, Args)]
pub struct TimeArgs {
    /// Last N seconds
    #[arg(long, conflicts_with_all = ["start", "end", "minutes"])]
    pub last: Option<u64>,
    /// From now minus N minutes until now
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub minutes: Option<u32>,
    /// RFC 3339, or local `YYYY-MM-DDTHH:MM[:SS]`
    #[arg(long)]
    pub start: Option<String>,
    /// Same formats as --start; defaults to now
    #[arg(long, requires = "start")]
    pub end: Option<String>,
}

impl TimeArgs {
    pub fn window(&self, now: DateTime<Utc>) -> Result<Window> {
        if let Some(seconds) = self.last {
            return Ok(Window::last_secs(seconds));
        }
        if let Some(minutes) = self.minutes {
            return Ok(Window::last_minutes(now, minutes));
        }
        let Some(start) = self.start.as_deref() else {
            bail!("give a range with --last, --minutes or --start");
        };
        let start = parse_cli_time(start)?;
        match self.end.as_deref() {
            Some(end) => Ok(Window::between(start, parse_cli_time(end)?)),
            None => Ok(Window::until_now(start, now)),
        }
    }

    /// Same span as `window`, pinned to absolute instants.
    pub fn absolute(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        match self.window(now)? {
            Window::Relative { seconds } => {
                let start = i64::try_from(seconds)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .and_then(|span| now.checked_sub_signed(span))
                    .context("--last is too large")?;
                Ok((start, now))
            }
            Window::Absolute { start, stop } => Ok((start, stop)),
        }
    }
}

pub fn series_query(signal: &str, window: Window, every: Option<u64>) -> SeriesQuery {
    let aggregation = match (every, window) {
        (Some(every_secs), _) => Aggregation::Mean { every_secs },
        (None, Window::Relative { .. }) => Aggregation::per_second_mean(),
        (None, Window::Absolute { .. }) => Aggregation::Raw,
    };
    SeriesQuery {
        signal: signal.to_string(),
        window,
        aggregation,
    }
}

/// Accepts RFC 3339 as-is; zone-less date-times are read in the local zone,
/// the way a browser's datetime-local input is.
pub fn parse_cli_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| anyhow!("{raw:?} does not exist in the local time zone"));
        }
    }
    bail!("unrecognised time {raw:?}; use RFC 3339 or YYYY-MM-DDTHH:MM")
}

/// `NAME` or `NAME=COLOR`.
pub fn split_overlay_arg(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('=') {
        Some((name, color)) if !color.trim().is_empty() => (name.trim(), Some(color.trim())),
        Some((name, _)) => (name.trim(), None),
        None => (raw.trim(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args(last: Option<u64>, minutes: Option<u32>, start: Option<&str>, end: Option<&str>) -> TimeArgs {
        TimeArgs {
            last,
            minutes,
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }

    #[test]
    fn windows_from_flags() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(args(Some(30), None, None, None).window(now).unwrap(), Window::last_secs(30));
        assert_eq!(
            args(None, Some(5), None, None).window(now).unwrap(),
            Window::last_minutes(now, 5)
        );

        let start = "2024-05-01T10:00:00Z";
        assert_eq!(
            args(None, None, Some(start), None).window(now).unwrap(),
            Window::until_now(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(), now)
        );
        assert!(args(None, None, None, None).window(now).is_err());

        let (from, to) = args(Some(60), None, None, None).absolute(now).unwrap();
        assert_eq!((to - from).num_seconds(), 60);
    }

    #[test]
    fn oversized_last_is_an_error() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        for last in [9_223_372_036_854_775, u64::MAX, 1 << 50] {
            assert!(args(Some(last), None, None, None).absolute(now).is_err(), "--last {last}");
        }
    }

    #[test]
    fn aggregation_follows_window_kind() {
        let now = Utc::now();
        assert_eq!(
            series_query("A", Window::last_secs(10), None).aggregation,
            Aggregation::per_second_mean()
        );
        assert_eq!(
            series_query("A", Window::last_minutes(now, 1), None).aggregation,
            Aggregation::Raw
        );
        assert_eq!(
            series_query("A", Window::last_minutes(now, 1), Some(10)).aggregation,
            Aggregation::Mean { every_secs: 10 }
        );
    }

    #[test]
    fn parses_rfc3339_and_local_times() {
        assert_eq!(
            parse_cli_time("2024-01-01T00:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 31, 22, 0, 0).unwrap()
        );
        let local = parse_cli_time("2024-01-01T08:30").unwrap();
        assert_eq!(local.with_timezone(&Local).format("%H:%M").to_string(), "08:30");
        assert!(parse_cli_time("yesterday").is_err());
    }

    #[test]
    fn overlay_args_split_on_equals() {
        assert_eq!(split_overlay_arg("A=#ff0000"), ("A", Some("#ff0000")));
        assert_eq!(split_overlay_arg(" B "), ("B", None));
        assert_eq!(split_overlay_arg("C="), ("C", None));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
