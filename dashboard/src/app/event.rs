use super::state::{ChartId, FetchTarget};
use crate::overlay::OverlayAlign;
use crate::preset::Preset;
use telemetry_client::Point;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Ui(UiEvent),
    Data(DataEvent),
    Timer(TimerEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Needs an initial fetch, so the runtime intercepts it before the reducer.
    AddChartRequested { signal: String },
    RemoveChart { id: ChartId },
    OverlayToggled { signal: String },
    OverlayAlignChanged { align: OverlayAlign },
    TimeRangeChanged { secs: u64 },
    SearchChanged { term: String },
    PresetImported { preset: Preset },
    ShareRequested,
    ReloadCatalog,
}

/// Fetch outcomes. Errors travel as display strings; the reducer only shows
/// them.
#[derive(Debug, Clone)]
pub enum DataEvent {
    CatalogLoaded {
        result: Result<Vec<String>, String>,
    },
    ChartLoaded {
        signal: String,
        result: Result<Vec<Point>, String>,
    },
    SeriesRefreshed {
        target: FetchTarget,
        seq: u64,
        result: Result<Vec<Point>, String>,
    },
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    Tick { now_ms: i64 },
}
