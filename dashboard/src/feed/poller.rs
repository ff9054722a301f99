//! Fetch tasks. Each one owns its inputs and reports back over the event
//! channel; the runtime never blocks on the network.

use crate::app::{AppEvent, DataEvent, FetchRequest};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use telemetry_client::{SeriesQuery, TelemetrySource};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;

pub type Source = Arc<dyn TelemetrySource>;

fn send(tx: &UnboundedSender<AppEvent>, ev: DataEvent) {
    // receiver gone means the runtime was torn down; nothing left to update
    let _ = tx.send(AppEvent::Data(ev));
}

pub fn spawn_catalog_fetch(
    tasks: &mut JoinSet<()>,
    tx: UnboundedSender<AppEvent>,
    source: Source,
    lookback: Duration,
) {
    tasks.spawn(async move {
        let result = source
            .signal_names(lookback)
            .await
            .map_err(|err| err.to_string());
        send(&tx, DataEvent::CatalogLoaded { result });
    });
}

pub fn spawn_initial_fetch(
    tasks: &mut JoinSet<()>,
    tx: UnboundedSender<AppEvent>,
    source: Source,
    query: SeriesQuery,
) {
    tasks.spawn(async move {
        let result = source.series(&query).await.map_err(|err| err.to_string());
        send(
            &tx,
            DataEvent::ChartLoaded {
                signal: query.signal,
                result,
            },
        );
    });
}

/// Fan out one tick's worth of requests and report each result as it is
/// joined. A failure only affects its own target.
pub fn spawn_refresh(
    tasks: &mut JoinSet<()>,
    tx: UnboundedSender<AppEvent>,
    source: Source,
    requests: Vec<FetchRequest>,
) {
    if requests.is_empty() {
        return;
    }
    tasks.spawn(async move {
        let fetches = requests.iter().map(|req| source.series(&req.query));
        let results = join_all(fetches).await;
        for (req, result) in requests.into_iter().zip(results) {
            send(
                &tx,
                DataEvent::SeriesRefreshed {
                    target: req.target,
                    seq: req.seq,
                    result: result.map_err(|err| err.to_string()),
                },
            );
        }
    });
}
