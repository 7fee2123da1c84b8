use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;

use crate::clock::Clock;
use crate::table::TableState;

/// Drives periodic eviction of stale entries. A thin wrapper around the
/// clock's ticker: all of the actual pruning logic lives on
/// [`TableState::prune_once`], so this is just the scheduling loop.
pub(crate) fn spawn(
    state: Arc<TableState>,
    clock: Arc<dyn Clock>,
    staleness: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = clock.ticker(interval);
        while ticks.next().await.is_some() {
            if state.is_shut_down() {
                break;
            }
            let cutoff = clock.now().checked_sub(staleness).unwrap_or_else(|| clock.now());
            state.prune_once(cutoff);
        }
    })
}
