use super::event::*;
use super::state::*;
use crate::debug_hooks;

pub fn reduce(state: &mut AppState, ev: AppEvent) -> bool {
    match ev {
        AppEvent::Ui(u) => reduce_ui(state, u),
        AppEvent::Data(d) => reduce_data(state, d),
        AppEvent::Timer(t) => reduce_timer(state, t),
    }
}

fn reduce_ui(state: &mut AppState, ev: UiEvent) -> bool {
    match ev {
        UiEvent::AddChartRequested { signal } => {
            state.status_message = format!("Loading {signal}...");
            true
        }
        UiEvent::RemoveChart { id } => {
            let before = state.charts.len();
            state.charts.retain(|c| c.id != id);
            if state.charts.len() == before {
                state.status_message = format!("No chart {id}.");
                return false;
            }
            state.status_message = format!("Chart {id} removed.");
            true
        }
        UiEvent::OverlayToggled { signal } => {
            if signal.trim().is_empty() {
                return false;
            }
            if state.is_overlaid(&signal) {
                state.overlays.retain(|o| o.signal != signal);
                state.status_message = format!("{signal} removed from overlay.");
            } else {
                let color = state.take_palette_color();
                state.status_message = format!("{signal} overlaid in {color}.");
                state.push_overlay(signal, color);
            }
            true
        }
        UiEvent::OverlayAlignChanged { align } => {
            if state.overlay_align == align {
                return false;
            }
            state.overlay_align = align;
            true
        }
        UiEvent::TimeRangeChanged { secs } => {
            let secs = secs.max(1);
            if secs == state.time_range_secs {
                return false;
            }
            state.time_range_secs = secs;
            state.status_message = format!("Range set to {secs}s");
            true
        }
        UiEvent::SearchChanged { term } => {
            if term == state.search_term {
                return false;
            }
            state.search_term = term;
            true
        }
        UiEvent::PresetImported { preset } => {
            apply_preset(state, preset);
            true
        }
        UiEvent::ShareRequested => {
            state.status_message = match state.to_preset().encode() {
                Ok(code) => format!("Preset: {code}"),
                Err(err) => format!("Could not export preset: {err}"),
            };
            true
        }
        UiEvent::ReloadCatalog => {
            state.status_message = "Reloading signals...".to_string();
            true
        }
    }
}

/// Rebuild the layout from a preset. Charts get new ids and wait for the next
/// tick for data; the palette cursor stays where it was.
fn apply_preset(state: &mut AppState, preset: crate::preset::Preset) {
    state.time_range_secs = preset.time_range_sec.max(1);
    state.charts.clear();
    state.overlays.clear();

    let chart_color = state.default_color.clone();
    for signal in preset.individual_sensors {
        state.push_chart(signal, chart_color.clone(), Vec::new());
    }
    for ov in preset.overlay_sensors {
        if state.is_overlaid(&ov.sensor_name) {
            continue;
        }
        state.push_overlay(ov.sensor_name, ov.color);
    }

    debug_hooks::log_preset_applied(state.charts.len(), state.overlays.len(), state.time_range_secs);
    state.status_message = format!(
        "Preset loaded: {} charts, {} overlaid, {}s range.",
        state.charts.len(),
        state.overlays.len(),
        state.time_range_secs
    );
}

fn reduce_data(state: &mut AppState, ev: DataEvent) -> bool {
    match ev {
        DataEvent::CatalogLoaded { result } => match result {
            Ok(names) => {
                let color = state.default_color.clone();
                let count = state.catalog.replace(names, &color);
                state.catalog_error = None;
                debug_hooks::log_catalog_loaded(count);
                state.status_message = format!("{count} signals available.");
                true
            }
            Err(err) => {
                // keep whatever listing we had
                debug_hooks::log_fetch_error("signal list", &err);
                state.catalog_error = Some(err.clone());
                state.status_message = format!("Failed to load signals: {err}");
                true
            }
        },
        DataEvent::ChartLoaded { signal, result } => match result {
            Ok(points) => {
                let color = state.default_color.clone();
                let count = points.len();
                let id = state.push_chart(signal.clone(), color, points);
                state.status_message = format!("Chart {id}: {signal} ({count} points).");
                true
            }
            Err(err) => {
                debug_hooks::log_fetch_error(&signal, &err);
                state.status_message = format!("Could not add {signal}: {err}");
                true
            }
        },
        DataEvent::SeriesRefreshed {
            target,
            seq,
            result,
        } => apply_refresh(state, target, seq, result),
    }
}

fn apply_refresh(
    state: &mut AppState,
    target: FetchTarget,
    seq: u64,
    result: Result<Vec<telemetry_client::Point>, String>,
) -> bool {
    let slot = match &target {
        FetchTarget::Chart(id) => state
            .charts
            .iter_mut()
            .find(|c| c.id == *id)
            .map(|c| (&mut c.seq, &mut c.points, &mut c.last_error)),
        FetchTarget::Overlay(name) => state
            .overlays
            .iter_mut()
            .find(|o| &o.signal == name)
            .map(|o| (&mut o.seq, &mut o.points, &mut o.last_error)),
    };
    let Some((tracker, points, last_error)) = slot else {
        debug_hooks::log_orphan_result(&target);
        return false;
    };

    if !tracker.accepts(seq) {
        debug_hooks::log_stale_drop(&target, seq, tracker.applied);
        return false;
    }

    match result {
        Ok(fresh) => {
            tracker.applied = seq;
            debug_hooks::log_series_applied(&target, seq, fresh.len());
            *points = fresh;
            *last_error = None;
        }
        Err(err) => {
            // previous points stay on screen
            debug_hooks::log_fetch_error(&target.to_string(), &err);
            *last_error = Some(err);
        }
    }
    true
}

fn reduce_timer(state: &mut AppState, ev: TimerEvent) -> bool {
    match ev {
        TimerEvent::Tick { now_ms } => {
            state.tick_count += 1;
            state.last_tick_ms = now_ms;
            false
        }
    }
}
