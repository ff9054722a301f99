pub mod commands;
pub mod event;
pub mod reducer;
pub mod render;
pub mod state;

pub use event::*;
pub use state::*;

use crate::debug_hooks;
use crate::feed::poller::{self, Source};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Owns the state and every in-flight fetch. Dropping it aborts the fetches;
/// anything they would have sent is lost with the channel.
pub struct AppRuntime {
    pub state: AppState,
    source: Source,
    catalog_lookback: Duration,
    tx: UnboundedSender<AppEvent>,
    rx: UnboundedReceiver<AppEvent>,
    tasks: JoinSet<()>,
    dirty: bool,
}

impl AppRuntime {
    pub fn new(state: AppState, source: Source, catalog_lookback: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state,
            source,
            catalog_lookback,
            tx,
            rx,
            tasks: JoinSet::new(),
            dirty: true,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn handle_event(&mut self, ev: AppEvent) {
        let changed = reducer::reduce(&mut self.state, ev);
        if changed {
            self.dirty = true;
        }
    }

    /// UI intents. The ones that need the network start their fetch here;
    /// everything else is plain state.
    pub fn dispatch(&mut self, ev: UiEvent) {
        match &ev {
            UiEvent::AddChartRequested { signal } => {
                if signal.trim().is_empty() {
                    return;
                }
                let query = self.state.live_query(signal);
                poller::spawn_initial_fetch(&mut self.tasks, self.tx.clone(), self.source.clone(), query);
            }
            UiEvent::ReloadCatalog => self.refresh_catalog(),
            _ => {}
        }

        let newly_overlaid = match &ev {
            UiEvent::OverlayToggled { signal } if !self.state.is_overlaid(signal) => Some(signal.clone()),
            _ => None,
        };
        self.handle_event(AppEvent::Ui(ev));

        // a new overlay gets data now rather than on the next tick
        if let Some(signal) = newly_overlaid {
            if let Some(req) = self.state.plan_fetch(&FetchTarget::Overlay(signal)) {
                poller::spawn_refresh(&mut self.tasks, self.tx.clone(), self.source.clone(), vec![req]);
            }
        }
    }

    pub fn refresh_catalog(&mut self) {
        poller::spawn_catalog_fetch(
            &mut self.tasks,
            self.tx.clone(),
            self.source.clone(),
            self.catalog_lookback,
        );
    }

    pub fn add_chart(&mut self, signal: impl Into<String>) {
        self.dispatch(UiEvent::AddChartRequested { signal: signal.into() });
    }

    pub fn remove_chart(&mut self, id: ChartId) {
        self.dispatch(UiEvent::RemoveChart { id });
    }

    pub fn toggle_overlay(&mut self, signal: impl Into<String>) {
        self.dispatch(UiEvent::OverlayToggled { signal: signal.into() });
    }

    /// One poll: refetch every chart and overlay for the current range. Does
    /// not wait for earlier polls to finish.
    pub fn tick(&mut self, now_ms: i64) {
        let requests = self.state.plan_refresh();
        debug_hooks::log_poll_tick(self.state.tick_count + 1, requests.len(), self.tasks.len());
        poller::spawn_refresh(&mut self.tasks, self.tx.clone(), self.source.clone(), requests);
        self.handle_event(AppEvent::Timer(TimerEvent::Tick { now_ms }));
    }

    /// Apply whatever has already arrived, without waiting. Returns the count.
    pub fn drain(&mut self) -> usize {
        self.reap();
        let mut n = 0;
        while let Ok(ev) = self.rx.try_recv() {
            self.handle_event(ev);
            n += 1;
        }
        n
    }

    /// Wait for every in-flight fetch and apply the results.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                debug_hooks::log_task_failure(err.to_string());
            }
        }
        self.drain();
    }

    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(err) = joined {
                debug_hooks::log_task_failure(err.to_string());
            }
        }
    }

    pub fn render_if_dirty(&mut self, mut render: impl FnMut(&AppState)) {
        if self.dirty {
            render(&self.state);
            self.dirty = false;
        }
    }

    /// Poll on `interval` until `shutdown` resolves, applying fetch results
    /// and `commands` as they come in and re-rendering after every change.
    pub async fn run(
        &mut self,
        interval: Duration,
        commands: Option<UnboundedReceiver<UiEvent>>,
        shutdown: impl Future<Output = ()>,
        mut render: impl FnMut(&AppState),
    ) {
        let mut commands = commands;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.tick(now_ms()),
                Some(ev) = self.rx.recv() => self.handle_event(ev),
                cmd = next_command(&mut commands) => match cmd {
                    Some(cmd) => self.dispatch(cmd),
                    None => commands = None,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(err) = joined {
                        debug_hooks::log_task_failure(err.to_string());
                    }
                }
            }
            self.render_if_dirty(&mut render);
        }
    }
}

async fn next_command(rx: &mut Option<UnboundedReceiver<UiEvent>>) -> Option<UiEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
