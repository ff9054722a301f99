mod cli;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Command, LiveArgs, PresetCommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telemetry_client::{FluxBuilder, QueryClient, SeriesQuery, TelemetrySource};
use telemetry_dash::app::commands::{self, HELP};
use telemetry_dash::app::{render, AppRuntime, AppState, UiEvent};
use telemetry_dash::catalog::SignalCatalog;
use telemetry_dash::debug_hooks;
use telemetry_dash::export;
use telemetry_dash::feed::poller::Source;
use telemetry_dash::feed::SyntheticSource;
use telemetry_dash::persist::{DashboardConfig, Persistence};
use telemetry_dash::preset::{OverlayPreset, Preset};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_source(cfg: &DashboardConfig, demo: bool) -> Result<Source> {
    if demo {
        tracing::info!("demo mode: using synthetic telemetry");
        return Ok(Arc::new(SyntheticSource::default()));
    }
    let client = QueryClient::new(cfg.influx.clone(), cfg.schema.clone()).context("build store client")?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let persistence = match &cli.config {
        Some(path) => Persistence::with_path(path),
        None => Persistence::new()?,
    };
    // `file_cfg` is what gets saved back; `cfg` carries environment overrides
    let file_cfg = persistence.load();
    let (cfg, applied) = file_cfg.clone().with_env_overrides();
    if !applied.is_empty() {
        tracing::debug!(vars = ?applied, "environment overrides applied");
    }

    match cli.command {
        Command::Signals { search, limit } => {
            let source = build_source(&cfg, cli.demo)?;
            let names = source
                .signal_names(cfg.schema.default_lookback())
                .await
                .context("fetch signal list")?;
            let mut catalog = SignalCatalog::default();
            catalog.replace(names, &cfg.default_color);
            let hits = catalog.search(search.as_deref().unwrap_or(""), limit.unwrap_or(cfg.search_limit));
            for info in &hits {
                println!("{}", info.name);
            }
            eprintln!("{} of {} signals", hits.len(), catalog.len());
        }
        Command::Query { signal, time, every } => {
            let window = time.window(Utc::now())?;
            let flux = FluxBuilder::new(cfg.schema.clone())
                .series(&cli::series_query(&signal, window, every))
                .context("build query")?;
            println!("{flux}");
        }
        Command::Download { signal, time, dir } => {
            let now = Utc::now();
            let (start, stop) = time.absolute(now)?;
            let source = build_source(&cfg, cli.demo)?;
            let query = SeriesQuery::raw_range(&signal, start, stop);
            let points = source.series(&query).await.with_context(|| format!("fetch {signal}"))?;
            if points.is_empty() {
                bail!("no data for {signal} between {start} and {stop}");
            }
            let dir = dir
                .or_else(|| cfg.download_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            let path = export::write_download(&dir, &signal, &points, now.timestamp_millis())?;
            println!("{} rows -> {}", points.len(), path.display());
        }
        Command::Live(args) => live(args, cfg, file_cfg, &persistence, cli.demo).await?,
        Command::Preset(PresetCommand::Encode { range, charts, overlays }) => {
            let mut palette = cfg.palette.iter().cycle();
            let overlay_sensors = overlays
                .iter()
                .map(|raw| {
                    let (name, color) = cli::split_overlay_arg(raw);
                    let color = match color {
                        Some(c) => c.to_string(),
                        None => palette.next().cloned().unwrap_or_else(|| cfg.default_color.clone()),
                    };
                    OverlayPreset {
                        sensor_name: name.to_string(),
                        color,
                    }
                })
                .collect();
            let preset = Preset {
                time_range_sec: range.max(1),
                individual_sensors: charts,
                overlay_sensors,
            };
            println!("{}", preset.encode()?);
        }
        Command::Preset(PresetCommand::Decode { code }) => {
            let preset = Preset::decode(&code).context("decode preset")?;
            println!("{}", serde_json::to_string_pretty(&preset)?);
        }
    }
    Ok(())
}

async fn live(
    args: LiveArgs,
    cfg: DashboardConfig,
    mut file_cfg: DashboardConfig,
    persistence: &Persistence,
    demo: bool,
) -> Result<()> {
    let source = build_source(&cfg, demo)?;
    let mut state = AppState::from_config(&cfg);
    state.overlay_align = args.align;
    let mut runtime = AppRuntime::new(state, source, cfg.schema.default_lookback());
    runtime.refresh_catalog();

    let code = match (&args.preset, args.resume) {
        (Some(code), _) => Some(code.clone()),
        (None, true) => file_cfg.last_preset.clone(),
        (None, false) => None,
    };
    if let Some(code) = code {
        let preset = Preset::decode(&code).context("decode preset")?;
        runtime.dispatch(UiEvent::PresetImported { preset });
    }
    if let Some(secs) = args.range {
        runtime.dispatch(UiEvent::TimeRangeChanged { secs });
    }
    for signal in args.charts {
        runtime.add_chart(signal);
    }
    for signal in args.overlays {
        runtime.toggle_overlay(signal);
    }

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let quit_rx = if args.no_input {
        drop(cmd_tx);
        None
    } else {
        eprintln!("{HELP}");
        let quit_rx = commands::spawn_reader(std::io::BufReader::new(std::io::stdin()), cmd_tx)
            .context("start input thread")?;
        Some(quit_rx)
    };

    let deadline = args.for_secs.map(Duration::from_secs);
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = wait_quit(quit_rx) => {}
            _ = sleep_for(deadline) => {}
        }
    };

    debug_hooks::log_runtime_start(cfg.poll_interval_ms, runtime.state.charts.len(), runtime.state.overlays.len());
    let clear = std::io::stdout().is_terminal();
    runtime
        .run(cfg.poll_interval(), Some(cmd_rx), shutdown, |state| {
            if clear {
                print!("\x1b[2J\x1b[H");
            }
            println!("{}", render::render(state));
        })
        .await;

    let code = runtime.state.to_preset().encode()?;
    eprintln!("layout: {code}");
    file_cfg.last_preset = Some(code);
    persistence.save_now(&file_cfg).context("save config")?;
    tracing::info!("live view stopped");
    Ok(())
}

async fn wait_quit(rx: Option<oneshot::Receiver<()>>) {
    match rx {
        Some(rx) => {
            let _ = rx.await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_for(deadline: Option<Duration>) {
    match deadline {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}
