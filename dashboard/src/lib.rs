//! Live CAN-bus telemetry dashboard: signal catalog, live charts with
//! sequence-guarded polling, overlay merging, presets and CSV export.

pub mod app;
pub mod catalog;
pub mod debug_hooks;
pub mod export;
pub mod feed;
pub mod overlay;
pub mod persist;
pub mod preset;
