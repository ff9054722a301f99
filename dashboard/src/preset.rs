//! Shareable dashboard layouts: base64 over a small JSON document.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    #[serde(deserialize_with = "range_secs")]
    pub time_range_sec: u64,
    pub individual_sensors: Vec<String>,
    pub overlay_sensors: Vec<OverlayPreset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPreset {
    pub sensor_name: String,
    pub color: String,
}

/// Any JSON number: fractions round up, and anything below one second
/// becomes one.
fn range_secs<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    let raw = f64::deserialize(de)?;
    if !raw.is_finite() {
        return Err(D::Error::custom("timeRangeSec must be a finite number"));
    }
    Ok(raw.ceil().max(1.0) as u64)
}

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("preset is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("preset JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Preset {
    pub fn encode(&self) -> Result<String, PresetError> {
        let json = serde_json::to_string(self)?;
        Ok(STANDARD.encode(json.as_bytes()))
    }

    /// Inverse of [`Preset::encode`]. Surrounding whitespace is ignored, which
    /// matters for codes pasted from a terminal.
    pub fn decode(code: &str) -> Result<Self, PresetError> {
        let bytes = STANDARD.decode(code.trim())?;
        let json = String::from_utf8(bytes)?;
        Ok(serde_json::from_str(&json)?)
    }
}
