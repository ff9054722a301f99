use crate::catalog::SignalCatalog;
use crate::overlay::{self, OverlayAlign, OverlayRow};
use crate::persist::DashboardConfig;
use crate::preset::{OverlayPreset, Preset};
use derive_more::{Display, From};
use std::time::{SystemTime, UNIX_EPOCH};
use telemetry_client::{Point, SeriesQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From)]
#[display("#{_0}")]
pub struct ChartId(pub u64);

/// What a fetch result is addressed to. Overlays are keyed by signal name
/// because a signal can only be overlaid once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum FetchTarget {
    #[display("chart {_0}")]
    Chart(ChartId),
    #[display("overlay {_0}")]
    Overlay(String),
}

#[derive(Debug, Clone)]
pub struct Chart {
    pub id: ChartId,
    pub signal: String,
    pub color: String,
    pub points: Vec<Point>,
    pub seq: SeqTracker,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OverlaySignal {
    pub signal: String,
    pub color: String,
    pub points: Vec<Point>,
    pub seq: SeqTracker,
    pub last_error: Option<String>,
}

/// Request numbering for one target. Numbers come from a counter shared by
/// the whole state, so a target re-created under the same key never accepts
/// answers meant for its predecessor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeqTracker {
    pub issued: u64,
    pub applied: u64,
}

impl SeqTracker {
    fn starting_at(seq: u64) -> Self {
        Self {
            issued: seq,
            applied: seq,
        }
    }

    /// Newer than what is on screen, and something we actually asked for.
    pub fn accepts(&self, seq: u64) -> bool {
        seq > self.applied && seq <= self.issued
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub target: FetchTarget,
    pub seq: u64,
    pub query: SeriesQuery,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub time_range_secs: u64,
    pub charts: Vec<Chart>,
    pub overlays: Vec<OverlaySignal>,
    pub overlay_align: OverlayAlign,

    pub palette: Vec<String>,
    /// Only ever moves forward; removing an overlay does not give its color back.
    pub palette_cursor: usize,
    pub default_color: String,

    pub catalog: SignalCatalog,
    pub catalog_error: Option<String>,
    pub search_term: String,
    pub search_limit: usize,

    pub status_message: String,
    pub tick_count: u64,
    pub last_tick_ms: i64,

    next_chart_id: u64,
    seq_counter: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

impl AppState {
    pub fn from_config(cfg: &DashboardConfig) -> Self {
        Self {
            time_range_secs: cfg.default_time_range_secs.max(1),
            charts: Vec::new(),
            overlays: Vec::new(),
            overlay_align: OverlayAlign::default(),

            palette: cfg.palette.clone(),
            palette_cursor: 0,
            default_color: cfg.default_color.clone(),

            catalog: SignalCatalog::default(),
            catalog_error: None,
            search_term: String::new(),
            search_limit: cfg.search_limit,

            status_message: String::new(),
            tick_count: 0,
            last_tick_ms: 0,

            next_chart_id: 1,
            seq_counter: 0,
        }
    }

    pub fn chart(&self, id: ChartId) -> Option<&Chart> {
        self.charts.iter().find(|c| c.id == id)
    }

    pub fn overlay(&self, signal: &str) -> Option<&OverlaySignal> {
        self.overlays.iter().find(|o| o.signal == signal)
    }

    pub fn is_overlaid(&self, signal: &str) -> bool {
        self.overlay(signal).is_some()
    }

    pub fn live_query(&self, signal: &str) -> SeriesQuery {
        SeriesQuery::live(signal, self.time_range_secs)
    }

    pub(crate) fn push_chart(&mut self, signal: String, color: String, points: Vec<Point>) -> ChartId {
        let id = ChartId(self.next_chart_id);
        self.next_chart_id += 1;
        self.charts.push(Chart {
            id,
            signal,
            color,
            points,
            seq: SeqTracker::starting_at(self.seq_counter),
            last_error: None,
        });
        id
    }

    pub(crate) fn push_overlay(&mut self, signal: String, color: String) {
        self.overlays.push(OverlaySignal {
            signal,
            color,
            points: Vec::new(),
            seq: SeqTracker::starting_at(self.seq_counter),
            last_error: None,
        });
    }

    /// Color for the next overlay; advances the cursor.
    pub(crate) fn take_palette_color(&mut self) -> String {
        if self.palette.is_empty() {
            return self.default_color.clone();
        }
        let color = self.palette[self.palette_cursor % self.palette.len()].clone();
        self.palette_cursor += 1;
        color
    }

    fn issue_seq(&mut self) -> u64 {
        self.seq_counter += 1;
        self.seq_counter
    }

    /// Tag a fresh request for one target, or `None` if the target is gone.
    pub fn plan_fetch(&mut self, target: &FetchTarget) -> Option<FetchRequest> {
        let seq = self.issue_seq();
        let range = self.time_range_secs;
        let (signal, tracker) = match target {
            FetchTarget::Chart(id) => {
                let chart = self.charts.iter_mut().find(|c| c.id == *id)?;
                (chart.signal.clone(), &mut chart.seq)
            }
            FetchTarget::Overlay(name) => {
                let ov = self.overlays.iter_mut().find(|o| &o.signal == name)?;
                (ov.signal.clone(), &mut ov.seq)
            }
        };
        tracker.issued = seq;
        Some(FetchRequest {
            target: target.clone(),
            seq,
            query: SeriesQuery::live(signal, range),
        })
    }

    /// One request per chart and per overlaid signal, for the current range.
    pub fn plan_refresh(&mut self) -> Vec<FetchRequest> {
        let targets: Vec<FetchTarget> = self
            .charts
            .iter()
            .map(|c| FetchTarget::Chart(c.id))
            .chain(self.overlays.iter().map(|o| FetchTarget::Overlay(o.signal.clone())))
            .collect();
        targets.iter().filter_map(|t| self.plan_fetch(t)).collect()
    }

    pub fn overlay_rows(&self) -> Vec<OverlayRow> {
        let series: Vec<(&str, &[Point])> = self
            .overlays
            .iter()
            .map(|o| (o.signal.as_str(), o.points.as_slice()))
            .collect();
        overlay::merge(self.overlay_align, &series)
    }

    pub fn to_preset(&self) -> Preset {
        Preset {
            time_range_sec: self.time_range_secs,
            individual_sensors: self.charts.iter().map(|c| c.signal.clone()).collect(),
            overlay_sensors: self
                .overlays
                .iter()
                .map(|o| OverlayPreset {
                    sensor_name: o.signal.clone(),
                    color: o.color.clone(),
                })
                .collect(),
        }
    }

    pub fn visible_signals(&self) -> Vec<&str> {
        self.catalog
            .search(&self.search_term, self.search_limit)
            .into_iter()
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// unix milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
