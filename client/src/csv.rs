//! Header-driven parsing of the store's CSV responses.
//!
//! Nothing in here returns an error: a response that cannot be understood
//! degrades to fewer (or no) rows.

use crate::point::Point;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use strum::Display;

pub const TIME_COLUMN: &str = "_time";
pub const VALUE_COLUMN: &str = "_value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    FieldCount,
    InvalidValue,
    InvalidTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line number within the response, header is line 1.
    pub line: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesParse {
    pub points: Vec<Point>,
    pub rejected: Vec<RejectedRow>,
}

impl SeriesParse {
    pub fn rejected_count(&self, reason: RejectReason) -> usize {
        self.rejected.iter().filter(|r| r.reason == reason).count()
    }
}

struct Table<'a> {
    header: Vec<&'a str>,
    rows: Vec<(usize, Vec<&'a str>)>,
}

fn split_cells(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

/// Returns `None` when there is no header or no line after it.
fn split_table(csv: &str) -> Option<Table<'_>> {
    let mut lines = csv.trim().lines().enumerate();
    let (_, first) = lines.next()?;
    let header = split_cells(first);

    let mut rows = Vec::new();
    let mut saw_line = false;
    for (idx, line) in lines {
        saw_line = true;
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_cells(line);
        // multi-table responses repeat the header between tables
        if cells == header {
            continue;
        }
        rows.push((idx + 1, cells));
    }
    saw_line.then_some(Table { header, rows })
}

fn column(header: &[&str], name: &str) -> Option<usize> {
    header.iter().position(|h| *h == name)
}

/// Values of `column_name` from every row whose width matches the header.
pub fn parse_distinct(csv: &str, column_name: &str) -> Vec<String> {
    let Some(table) = split_table(csv) else {
        return Vec::new();
    };
    let Some(idx) = column(&table.header, column_name) else {
        return Vec::new();
    };
    table
        .rows
        .into_iter()
        .filter(|(_, cells)| cells.len() == table.header.len())
        .map(|(_, cells)| cells[idx].to_string())
        .collect()
}

/// `_time`/`_value` rows as points, together with every row that was skipped.
///
/// Values must parse as a whole `f64`: a cell such as `12.5V` is rejected as
/// `InvalidValue` rather than read as its numeric prefix.
pub fn parse_series(csv: &str) -> SeriesParse {
    let Some(table) = split_table(csv) else {
        return SeriesParse::default();
    };
    let (Some(time_idx), Some(value_idx)) = (
        column(&table.header, TIME_COLUMN),
        column(&table.header, VALUE_COLUMN),
    ) else {
        log::warn!("missing {TIME_COLUMN} or {VALUE_COLUMN} in CSV header: {:?}", table.header);
        return SeriesParse::default();
    };

    let mut out = SeriesParse::default();
    for (line, cells) in table.rows {
        if cells.len() != table.header.len() {
            out.rejected.push(RejectedRow { line, reason: RejectReason::FieldCount });
            continue;
        }
        let Some(value) = parse_value(cells[value_idx]) else {
            out.rejected.push(RejectedRow { line, reason: RejectReason::InvalidValue });
            continue;
        };
        let Some(time) = parse_time_ms(cells[time_idx]) else {
            out.rejected.push(RejectedRow { line, reason: RejectReason::InvalidTime });
            continue;
        };
        out.points.push(Point { time, value });
    }

    if !out.rejected.is_empty() {
        log::debug!(
            "series parse kept {} rows, rejected {}",
            out.points.len(),
            out.rejected.len()
        );
    }
    out
}

pub fn parse_series_points(csv: &str) -> Vec<Point> {
    parse_series(csv).points
}

fn parse_value(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Epoch milliseconds for RFC 3339 stamps; zone-less stamps are read as UTC.
pub fn parse_time_ms(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_values_in_row_order() {
        assert_eq!(
            parse_distinct("_value\nWheelSpeedFL\nWheelSpeedFR", VALUE_COLUMN),
            vec!["WheelSpeedFL", "WheelSpeedFR"]
        );
    }

    #[test]
    fn distinct_reads_annotated_influx_layout() {
        let csv = ",result,table,_value\r\n\
                   ,_result,0,BMS_Max_Charge_Current\r\n\
                   ,_result,1,INV_Coolant_Temp\r\n\
                   \r\n\
                   ,result,table,_value\r\n\
                   ,_result,2,INV_Hot_Spot_Temp\r\n";
        assert_eq!(
            parse_distinct(csv, VALUE_COLUMN),
            vec!["BMS_Max_Charge_Current", "INV_Coolant_Temp", "INV_Hot_Spot_Temp"]
        );
    }

    #[test]
    fn distinct_skips_rows_of_the_wrong_width() {
        let csv = "table,_value\n0,A\n1,B,extra\n2";
        assert_eq!(parse_distinct(csv, VALUE_COLUMN), vec!["A"]);
    }

    #[test]
    fn distinct_degrades_to_empty() {
        assert!(parse_distinct("", VALUE_COLUMN).is_empty());
        assert!(parse_distinct("_value", VALUE_COLUMN).is_empty());
        assert!(parse_distinct("name\nA\nB", VALUE_COLUMN).is_empty());
    }

    #[test]
    fn series_drops_non_numeric_rows() {
        let parsed = parse_series("_time,_value\n2024-01-01T00:00:00Z,12.5\n2024-01-01T00:00:01Z,abc");
        assert_eq!(parsed.points, vec![Point::new(1_704_067_200_000, 12.5)]);
        assert_eq!(parsed.rejected, vec![RejectedRow { line: 3, reason: RejectReason::InvalidValue }]);
    }

    #[test]
    fn values_with_trailing_units_are_rejected() {
        let parsed = parse_series("_time,_value\n2024-01-01T00:00:00Z,12.5V");
        assert!(parsed.points.is_empty());
        assert_eq!(parsed.rejected_count(RejectReason::InvalidValue), 1);
    }

    #[test]
    fn series_keeps_valid_subset_in_order() {
        let csv = "_time,_value\n\
                   2024-01-01T00:00:00Z,1\n\
                   2024-01-01T00:00:01Z,NaN\n\
                   2024-01-01T00:00:02Z,3\n\
                   2024-01-01T00:00:03Z,\n\
                   2024-01-01T00:00:04Z,-5.25";
        let parsed = parse_series(csv);
        let values: Vec<f64> = parsed.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 3.0, -5.25]);
        assert_eq!(parsed.rejected_count(RejectReason::InvalidValue), 2);
    }

    #[test]
    fn series_missing_columns_is_empty_not_error() {
        assert_eq!(parse_series("time,value\n1,2"), SeriesParse::default());
        assert_eq!(parse_series("_time\n2024-01-01T00:00:00Z"), SeriesParse::default());
        assert_eq!(parse_series("garbage"), SeriesParse::default());
    }

    #[test]
    fn series_reports_bad_timestamps_and_widths() {
        let csv = ",result,table,_time,_value\n\
                   ,_result,0,not-a-time,4\n\
                   ,_result,0,2024-01-01T00:00:00.250Z,7\n\
                   ,_result,0\n";
        let parsed = parse_series(csv);
        assert_eq!(parsed.points, vec![Point::new(1_704_067_200_250, 7.0)]);
        assert_eq!(parsed.rejected_count(RejectReason::InvalidTime), 1);
        assert_eq!(parsed.rejected_count(RejectReason::FieldCount), 1);
        assert_eq!(RejectReason::FieldCount.to_string(), "field_count");
    }

    #[test]
    fn timestamps_in_several_shapes() {
        assert_eq!(parse_time_ms("2024-01-01T00:00:00Z"), Some(1_704_067_200_000));
        assert_eq!(parse_time_ms("2024-01-01T01:00:00+01:00"), Some(1_704_067_200_000));
        assert_eq!(parse_time_ms("2024-01-01T00:00:00.123456789Z"), Some(1_704_067_200_123));
        assert_eq!(parse_time_ms("2024-01-01T00:00:00"), Some(1_704_067_200_000));
        assert_eq!(parse_time_ms("2024-01-01"), Some(1_704_067_200_000));
        assert_eq!(parse_time_ms("yesterday"), None);
    }
}
