//! Combine several series onto one time axis for the overlay chart.

use std::collections::BTreeMap;
use std::str::FromStr;
use telemetry_client::Point;

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRow {
    pub time: i64,
    /// One cell per overlaid signal, in overlay order.
    pub values: Vec<(String, Option<f64>)>,
}

impl OverlayRow {
    pub fn value(&self, signal: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == signal)
            .and_then(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlayAlign {
    /// Row `i` takes the time of the first series and every series' `i`-th value.
    #[default]
    Index,
    /// One row per distinct timestamp across all series.
    Time,
}

impl FromStr for OverlayAlign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(OverlayAlign::Index),
            "time" => Ok(OverlayAlign::Time),
            other => Err(format!("unknown overlay alignment {other:?} (expected index or time)")),
        }
    }
}

pub fn merge(align: OverlayAlign, series: &[(&str, &[Point])]) -> Vec<OverlayRow> {
    match align {
        OverlayAlign::Index => merge_by_index(series),
        OverlayAlign::Time => merge_by_time(series),
    }
}

/// Positional merge. The row count follows the first series; shorter series
/// leave `None` in the tail.
pub fn merge_by_index(series: &[(&str, &[Point])]) -> Vec<OverlayRow> {
    let Some((_, first)) = series.first() else {
        return Vec::new();
    };
    first
        .iter()
        .enumerate()
        .map(|(i, anchor)| OverlayRow {
            time: anchor.time,
            values: series
                .iter()
                .map(|(name, points)| (name.to_string(), points.get(i).map(|p| p.value)))
                .collect(),
        })
        .collect()
}

/// Outer join on exact timestamps, ascending. A series with two points at the
/// same instant contributes the later one.
pub fn merge_by_time(series: &[(&str, &[Point])]) -> Vec<OverlayRow> {
    let mut table: BTreeMap<i64, Vec<Option<f64>>> = BTreeMap::new();
    for (col, (_, points)) in series.iter().enumerate() {
        for p in points.iter() {
            let row = table.entry(p.time).or_insert_with(|| vec![None; series.len()]);
            row[col] = Some(p.value);
        }
    }
    table
        .into_iter()
        .map(|(time, cells)| OverlayRow {
            time,
            values: series
                .iter()
                .zip(cells)
                .map(|((name, _), v)| (name.to_string(), v))
                .collect(),
        })
        .collect()
}
