use super::state::*;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use telemetry_client::Point;

const SPARK_WIDTH: usize = 40;
const OVERLAY_TAIL_ROWS: usize = 5;
const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Text snapshot of the dashboard: one line per chart, then the overlay table.
pub fn render(state: &AppState) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "range {}s | charts {} | overlay {} | signals {} | tick {}",
        state.time_range_secs,
        state.charts.len(),
        state.overlays.len(),
        state.catalog.len(),
        state.tick_count
    );
    if let Some(err) = &state.catalog_error {
        let _ = writeln!(out, "! signals: {err}");
    }

    for chart in &state.charts {
        let _ = writeln!(
            out,
            "{:<4} {:<24} {} {}",
            chart.id.to_string(),
            chart.signal,
            summarize(&chart.points),
            sparkline(&chart.points, SPARK_WIDTH)
        );
        if let Some(err) = &chart.last_error {
            let _ = writeln!(out, "     ! {err}");
        }
    }

    if !state.overlays.is_empty() {
        let header: Vec<String> = state
            .overlays
            .iter()
            .map(|o| format!("{} ({})", o.signal, o.color))
            .collect();
        let _ = writeln!(out, "overlay: {}", header.join(", "));
        for ov in state.overlays.iter().filter(|o| o.last_error.is_some()) {
            let _ = writeln!(out, "  ! {}: {}", ov.signal, ov.last_error.as_deref().unwrap_or_default());
        }

        let rows = state.overlay_rows();
        let skip = rows.len().saturating_sub(OVERLAY_TAIL_ROWS);
        for row in rows.iter().skip(skip) {
            let cells: Vec<String> = row
                .values
                .iter()
                .map(|(_, v)| v.map(|v| format!("{v:>10.3}")).unwrap_or_else(|| format!("{:>10}", "-")))
                .collect();
            let _ = writeln!(out, "  {} {}", format_time_local(row.time), cells.join(" "));
        }
    }

    if !state.status_message.is_empty() {
        let _ = writeln!(out, "> {}", state.status_message);
    }
    out
}

fn summarize(points: &[Point]) -> String {
    match points.last() {
        Some(last) => format!(
            "{:>5} pts  last {:>10.3} @ {}",
            points.len(),
            last.value,
            format_time_local(last.time)
        ),
        None => format!("{:>5} pts  (no data)", 0),
    }
}

/// Bucket `points` into at most `width` columns (mean per bucket) and draw
/// one block glyph per column, scaled between the series min and max.
pub fn sparkline(points: &[Point], width: usize) -> String {
    if points.is_empty() || width == 0 {
        return String::new();
    }
    let group = points.len().div_ceil(width);
    let means: Vec<f64> = points
        .chunks(group)
        .map(|c| c.iter().map(|p| p.value).sum::<f64>() / c.len() as f64)
        .collect();

    let lo = means.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    let top = (SPARK_LEVELS.len() - 1) as f64;

    means
        .iter()
        .map(|v| {
            let level = if span.is_finite() && span > 0.0 {
                (((v - lo) / span) * top).round() as usize
            } else {
                SPARK_LEVELS.len() / 2
            };
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

fn format_time_local(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}
