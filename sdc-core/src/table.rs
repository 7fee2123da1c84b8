use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::clock::Clock;
use crate::error::TableError;
use crate::fqdn::Fqdn;
use crate::pruner;

type Bucket = BTreeMap<String, Instant>;

/// A snapshot of the whole table: hostname -> IPs, in lexicographic order
/// within each bucket.
pub type Snapshot = BTreeMap<Fqdn, Vec<String>>;

struct Inner {
    buckets: BTreeMap<Fqdn, Bucket>,
    warm: bool,
    paused: bool,
    shut_down: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            warm: false,
            paused: false,
            shut_down: false,
        }
    }
}

pub(crate) struct TableState {
    inner: RwLock<Inner>,
}

impl TableState {
    pub(crate) fn is_shut_down(&self) -> bool {
        self.inner.read().shut_down
    }

    /// Evicts entries whose `last_seen` is strictly older than `cutoff`
    /// (`<`, never `<=` — an entry exactly at the boundary survives) and
    /// drops any bucket that becomes empty. No-op while paused or shut down.
    pub(crate) fn prune_once(&self, cutoff: Instant) {
        let mut inner = self.inner.write();
        if inner.paused || inner.shut_down {
            return;
        }
        inner.buckets.retain(|fqdn, bucket| {
            bucket.retain(|_, last_seen| *last_seen >= cutoff);
            if bucket.is_empty() {
                trace!(%fqdn, "pruned last address, dropping bucket");
                false
            } else {
                true
            }
        });
    }
}

/// Thread-safe hostname -> healthy-IP-set registry.
///
/// Cloning an `AddressTable` is cheap: it's a handle onto a shared,
/// `parking_lot::RwLock`-guarded map, not a copy of the map itself.
#[derive(Clone)]
pub struct AddressTable {
    state: Arc<TableState>,
    clock: Arc<dyn Clock>,
    prune_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl AddressTable {
    /// Builds the table and immediately spawns its pruner task.
    pub fn new(staleness: Duration, prune_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let state = Arc::new(TableState {
            inner: RwLock::new(Inner::new()),
        });
        let handle = pruner::spawn(state.clone(), clock.clone(), staleness, prune_interval);
        Self {
            state,
            clock,
            prune_handle: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Normalizes `fqdn`, stamps `ip` with the current time, and upserts it
    /// into the bucket. Never decreases an existing entry's `last_seen`.
    pub fn add(&self, fqdn: &Fqdn, ip: impl Into<String>) -> Result<(), TableError> {
        let mut inner = self.state.inner.write();
        if inner.shut_down {
            return Err(TableError::ShutDown);
        }
        let now = self.clock.now();
        let bucket = inner.buckets.entry(fqdn.clone()).or_default();
        let ip = ip.into();
        let last_seen = bucket.get(&ip).map_or(now, |prev| now.max(*prev));
        bucket.insert(ip, last_seen);
        Ok(())
    }

    /// Removes `ip` from `fqdn`'s bucket. Dropping the last IP removes the
    /// key entirely; removing an absent entry is not an error.
    pub fn remove(&self, fqdn: &Fqdn, ip: &str) -> Result<(), TableError> {
        let mut inner = self.state.inner.write();
        if inner.shut_down {
            return Err(TableError::ShutDown);
        }
        if let Some(bucket) = inner.buckets.get_mut(fqdn) {
            bucket.remove(ip);
            if bucket.is_empty() {
                inner.buckets.remove(fqdn);
            }
        }
        Ok(())
    }

    /// Atomically replaces `fqdn`'s bucket with exactly `ips`, each stamped
    /// with the current time.
    pub fn set_many(
        &self,
        fqdn: &Fqdn,
        ips: impl IntoIterator<Item = String>,
    ) -> Result<(), TableError> {
        let mut inner = self.state.inner.write();
        if inner.shut_down {
            return Err(TableError::ShutDown);
        }
        let now = self.clock.now();
        let bucket: Bucket = ips.into_iter().map(|ip| (ip, now)).collect();
        if bucket.is_empty() {
            inner.buckets.remove(fqdn);
        } else {
            inner.buckets.insert(fqdn.clone(), bucket);
        }
        Ok(())
    }

    /// Returns `fqdn`'s IPs in ascending lexicographic order, or an empty
    /// vector if the hostname is unknown.
    pub fn lookup(&self, fqdn: &Fqdn) -> Vec<String> {
        let inner = self.state.inner.read();
        inner
            .buckets
            .get(fqdn)
            .map(|bucket| bucket.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// A deep-copied snapshot of the entire table, safe to serialize
    /// without holding any lock.
    pub fn get_all(&self) -> Snapshot {
        let inner = self.state.inner.read();
        inner
            .buckets
            .iter()
            .map(|(fqdn, bucket)| (fqdn.clone(), bucket.keys().cloned().collect()))
            .collect()
    }

    pub fn is_warm(&self) -> bool {
        self.state.inner.read().warm
    }

    pub fn set_warm(&self, warm: bool) {
        self.state.inner.write().warm = warm;
    }

    pub fn pause_pruning(&self) {
        self.state.inner.write().paused = true;
    }

    pub fn resume_pruning(&self) {
        self.state.inner.write().paused = false;
    }

    /// Stops the pruner and rejects further mutations. Idempotent.
    pub fn shutdown(&self) {
        self.state.inner.write().shut_down = true;
        if let Some(handle) = self.prune_handle.lock().take() {
            handle.abort();
        }
    }
}
