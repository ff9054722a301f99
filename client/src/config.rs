use serde::{Deserialize, Serialize};
use std::{env, fmt, time::Duration};

pub const ENV_URL: &str = "INFLUX_URL";
pub const ENV_ORG: &str = "INFLUX_ORG";
pub const ENV_BUCKET: &str = "INFLUX_BUCKET";
pub const ENV_TOKEN: &str = "INFLUX_TOKEN";

const DEFAULT_URL: &str = "http://localhost:8086";
const DEFAULT_ORG: &str = "WFR";
const DEFAULT_BUCKET: &str = "ourCar";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Where the store lives and how to authenticate against it.
///
/// Built once per process and handed to [`crate::QueryClient::new`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    /// Server root, e.g. `http://localhost:8086`. The query path is appended.
    pub url: String,
    pub org: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    pub request_timeout_ms: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            org: DEFAULT_ORG.to_string(),
            token: String::new(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

// keep the token out of logs
impl fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl InfluxConfig {
    /// Defaults overlaid with `INFLUX_URL`, `INFLUX_ORG` and `INFLUX_TOKEN`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// Overlay whichever `INFLUX_*` variables are set. Returns the names of the
    /// variables that were applied.
    pub fn apply_env(&mut self) -> Vec<&'static str> {
        let mut applied = Vec::new();
        if let Some(v) = var(ENV_URL) {
            self.url = v;
            applied.push(ENV_URL);
        }
        if let Some(v) = var(ENV_ORG) {
            self.org = v;
            applied.push(ENV_ORG);
        }
        if let Some(v) = var(ENV_TOKEN) {
            self.token = v;
            applied.push(ENV_TOKEN);
        }
        applied
    }

    pub fn query_endpoint(&self) -> String {
        format!("{}/api/v2/query", self.url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

/// Names of the bucket, measurement, field and tag that hold CAN readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub bucket: String,
    pub measurement: String,
    pub field: String,
    pub signal_tag: String,
    /// How far back the distinct-signal query looks.
    pub catalog_lookback_secs: u64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            measurement: "canBus".to_string(),
            field: "sensorReading".to_string(),
            signal_tag: "signalName".to_string(),
            catalog_lookback_secs: 24 * 60 * 60,
        }
    }
}

impl SchemaConfig {
    pub fn apply_env(&mut self) -> Vec<&'static str> {
        match var(ENV_BUCKET) {
            Some(v) => {
                self.bucket = v;
                vec![ENV_BUCKET]
            }
            None => Vec::new(),
        }
    }

    pub fn default_lookback(&self) -> Duration {
        Duration::from_secs(self.catalog_lookback_secs.max(1))
    }
}

fn var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => {
            log::debug!("{key} not set, keeping configured value");
            None
        }
    }
}
