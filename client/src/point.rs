use serde::{Deserialize, Serialize};

/// One sensor reading: epoch milliseconds and the decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub time: i64,
    pub value: f64,
}

impl Point {
    pub fn new(time: i64, value: f64) -> Self {
        Self { time, value }
    }
}
