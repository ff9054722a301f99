// telemetry-dash/src/persist.rs

use crate::catalog::{DEFAULT_SEARCH_LIMIT, DEFAULT_SIGNAL_COLOR};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use telemetry_client::{InfluxConfig, SchemaConfig};

/// Bump when you change config schema.
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_PALETTE: [&str; 10] = [
    "#2563eb", "#10b981", "#f97316", "#ef4444", "#eab308", "#8b5cf6", "#ec4899", "#14b8a6",
    "#f43f5e", "#7c3aed",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub version: u32,

    // --- store ---
    pub influx: InfluxConfig,
    pub schema: SchemaConfig,

    // --- live view ---
    pub poll_interval_ms: u64,
    pub default_time_range_secs: u64,
    pub default_color: String,
    pub palette: Vec<String>,
    pub search_limit: usize,

    // --- download / presets ---
    pub download_dir: Option<PathBuf>,
    pub last_preset: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,

            influx: InfluxConfig::default(),
            schema: SchemaConfig::default(),

            poll_interval_ms: 1_000,
            default_time_range_secs: 60,
            default_color: DEFAULT_SIGNAL_COLOR.to_string(),
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            search_limit: DEFAULT_SEARCH_LIMIT,

            download_dir: None,
            last_preset: None,
        }
    }
}

impl DashboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }

    /// Overlay `INFLUX_*` variables on top of the file values. Returns the
    /// variables that took effect. Keep the un-overridden config around for
    /// saving so an environment token never lands on disk.
    pub fn with_env_overrides(mut self) -> (Self, Vec<&'static str>) {
        let mut applied = self.influx.apply_env();
        applied.extend(self.schema.apply_env());
        (self, applied)
    }

    /// Clamp values a hand-edited file could break.
    fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }
        if self.palette.is_empty() {
            self.palette = DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect();
        }
        self.default_time_range_secs = self.default_time_range_secs.max(1);
        if self.search_limit == 0 {
            self.search_limit = DEFAULT_SEARCH_LIMIT;
        }
    }
}

struct Inner {
    path: PathBuf,
    last_saved_json: Mutex<String>,
}

#[derive(Clone)]
pub struct Persistence {
    inner: Arc<Inner>,
}

impl Persistence {
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(default_config_path()?))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                last_saved_json: Mutex::new(String::new()),
            }),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.inner.path
    }

    /// Missing file → defaults. Unreadable file → archived next to itself,
    /// then defaults.
    pub fn load(&self) -> DashboardConfig {
        let path = &self.inner.path;
        if !path.exists() {
            return DashboardConfig::default();
        }
        match read_json::<DashboardConfig>(path) {
            Ok(mut cfg) => {
                cfg.sanitize();
                cfg
            }
            Err(err) => {
                archive_corrupt(path, &err);
                DashboardConfig::default()
            }
        }
    }

    /// Save if content changed (prevents hammering disk)
    pub fn save_now(&self, cfg: &DashboardConfig) -> Result<()> {
        let path = &self.inner.path;

        let parent = path.parent().context("config path has no parent")?;
        fs::create_dir_all(parent).with_context(|| format!("create config dir {:?}", parent))?;

        let json = serde_json::to_string_pretty(cfg)?;

        // held across the write; only a successful write counts as saved
        let mut last = self
            .inner
            .last_saved_json
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *last == json {
            return Ok(());
        }

        // backup previous
        if path.exists() {
            let backup = path.with_extension("json.bak");
            let _ = fs::copy(path, backup);
        }

        atomic_write(path, json.as_bytes())?;
        *last = json;
        tracing::debug!(target: "dash.config", path = ?path, "config saved");
        Ok(())
    }
}

fn default_config_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("com", "wfr", "telemetry-dash")
        .context("ProjectDirs::from returned None")?;
    Ok(proj.config_dir().join("config.json"))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {:?}", path))?;
    let value = serde_json::from_slice::<T>(&bytes).with_context(|| "parse json")?;
    Ok(value)
}

fn archive_corrupt(path: &Path, err: &anyhow::Error) {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let archived = path.with_extension(format!("corrupt.{ts}.json"));
    let _ = fs::rename(path, &archived);
    tracing::warn!(target: "dash.config", archived = ?archived, "config corrupt; archived. error: {err:?}");
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().context("no parent dir for config path")?;
    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    {
        let mut f = fs::File::create(&tmp).with_context(|| format!("create tmp {:?}", tmp))?;
        f.write_all(bytes).with_context(|| "write tmp")?;
        let _ = f.sync_all();
    }

    fs::rename(&tmp, path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Persistence::with_path(dir.path().join("config.json")).load();
        assert_eq!(cfg, DashboardConfig::default());
        assert_eq!(cfg.palette.len(), 10);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn save_then_load_keeps_values_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = Persistence::with_path(&path);

        let mut cfg = DashboardConfig::default();
        cfg.default_time_range_secs = 300;
        cfg.last_preset = Some("eyJ9".into());
        store.save_now(&cfg).unwrap();
        assert!(!path.with_extension("json.bak").exists());

        cfg.poll_interval_ms = 2_000;
        store.save_now(&cfg).unwrap();
        assert!(path.with_extension("json.bak").exists());

        let loaded = store.load();
        assert_eq!(loaded.default_time_range_secs, 300);
        assert_eq!(loaded.poll_interval_ms, 2_000);
        assert_eq!(loaded.last_preset.as_deref(), Some("eyJ9"));
    }

    #[test]
    fn failed_write_is_retried_with_same_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        // a non-empty directory in the way makes the final rename fail
        fs::create_dir(&path).unwrap();
        fs::write(path.join("blocker"), "x").unwrap();
        let store = Persistence::with_path(&path);

        let cfg = DashboardConfig {
            last_preset: Some("eyJ9".into()),
            ..DashboardConfig::default()
        };
        assert!(store.save_now(&cfg).is_err());

        fs::remove_dir_all(&path).unwrap();
        store.save_now(&cfg).unwrap();
        assert_eq!(store.load().last_preset.as_deref(), Some("eyJ9"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"poll_interval_ms": 500, "palette": [], "influx": {"org": "Team"}}"#).unwrap();

        let cfg = Persistence::with_path(&path).load();
        assert_eq!(cfg.poll_interval_ms, 500);
        assert_eq!(cfg.influx.org, "Team");
        assert_eq!(cfg.influx.url, InfluxConfig::default().url);
        assert_eq!(cfg.palette.len(), DEFAULT_PALETTE.len());
        assert_eq!(cfg.schema, SchemaConfig::default());
    }

    #[test]
    fn corrupt_file_is_archived() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let cfg = Persistence::with_path(&path).load();
        assert_eq!(cfg, DashboardConfig::default());
        assert!(!path.exists());
        let archived = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains(".corrupt."));
        assert!(archived);
    }

    #[test]
    fn empty_token_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        Persistence::with_path(&path).save_now(&DashboardConfig::default()).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("token"));
    }
}
