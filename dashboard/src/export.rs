use crate::overlay::OverlayRow;
use anyhow::{Context, Result};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use telemetry_client::Point;

/// A flat record that can be written as one CSV row.
pub trait CsvRecord {
    fn field_names(&self) -> Vec<Cow<'_, str>>;
    /// Cell text for every field, in `field_names` order. Empty for missing.
    fn fields(&self) -> Vec<String>;
}

impl CsvRecord for Point {
    fn field_names(&self) -> Vec<Cow<'_, str>> {
        vec![Cow::Borrowed("time"), Cow::Borrowed("value")]
    }

    fn fields(&self) -> Vec<String> {
        vec![self.time.to_string(), self.value.to_string()]
    }
}

impl CsvRecord for OverlayRow {
    fn field_names(&self) -> Vec<Cow<'_, str>> {
        std::iter::once(Cow::Borrowed("time"))
            .chain(self.values.iter().map(|(name, _)| Cow::Borrowed(name.as_str())))
            .collect()
    }

    fn fields(&self) -> Vec<String> {
        std::iter::once(self.time.to_string())
            .chain(self.values.iter().map(|(_, v)| v.map(|v| v.to_string()).unwrap_or_default()))
            .collect()
    }
}

/// Header from the first record, then one line per record. No quoting and no
/// trailing newline.
pub fn to_csv<R: CsvRecord>(records: &[R]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(first.field_names().join(","));
    lines.extend(records.iter().map(|r| r.fields().join(",")));
    lines.join("\n")
}

pub fn download_file_name(signal: &str, unix_ms: i64) -> String {
    format!("{signal}_{unix_ms}.csv")
}

/// Write `points` as `{signal}_{now_ms}.csv` under `dir` and return the path.
pub fn write_download(dir: &Path, signal: &str, points: &[Point], now_ms: i64) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create download dir {:?}", dir))?;
    let path = dir.join(download_file_name(signal, now_ms));
    fs::write(&path, to_csv(points)).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_to_csv() {
        let points = [Point::new(1, 2.0), Point::new(3, 4.0)];
        assert_eq!(to_csv(&points), "time,value\n1,2\n3,4");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(to_csv::<Point>(&[]), "");
    }

    #[test]
    fn overlay_rows_leave_missing_cells_blank() {
        let rows = [
            OverlayRow {
                time: 10,
                values: vec![("A".into(), Some(1.5)), ("B".into(), Some(-2.0))],
            },
            OverlayRow {
                time: 20,
                values: vec![("A".into(), Some(1.75)), ("B".into(), None)],
            },
        ];
        assert_eq!(to_csv(&rows), "time,A,B\n10,1.5,-2\n20,1.75,");
    }

    #[test]
    fn download_lands_in_named_file() {
        assert_eq!(download_file_name("WheelSpeedFL", 1700000000000), "WheelSpeedFL_1700000000000.csv");

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exports");
        let path = write_download(&target, "Temp", &[Point::new(5, 0.5)], 42).unwrap();
        assert_eq!(path, target.join("Temp_42.csv"));
        assert_eq!(fs::read_to_string(path).unwrap(), "time,value\n5,0.5");
    }
}
