use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::record::ClientRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("client store unavailable: {0}")]
    Unavailable(String),
}

/// Where client records live.
///
/// `upsert` must apply `update` atomically with respect to other calls for
/// the same identity. A shared external store can implement this for
/// multi-instance deployments.
pub trait ClientStore: Send + Sync {
    fn get(&self, identity: &str) -> Result<Option<ClientRecord>, StoreError>;

    /// Loads (or creates) the record, runs `update` on it, writes it back, and
    /// returns the stored copy.
    fn upsert(
        &self,
        identity: &str,
        now: Instant,
        update: &mut dyn FnMut(&mut ClientRecord),
    ) -> Result<ClientRecord, StoreError>;

    /// Drops records idle longer than `idle_ttl` that are not serving a block.
    /// Returns how many were removed.
    fn sweep(&self, now: Instant, idle_ttl: Duration) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store. Each upsert holds only the shard lock of its key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: DashMap<String, ClientRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }
}

fn evictable(r: &ClientRecord, now: Instant, idle_ttl: Duration) -> bool {
    r.idle_for(now) > idle_ttl && !r.is_blocked(now)
}

impl ClientStore for MemoryStore {
    fn get(&self, identity: &str) -> Result<Option<ClientRecord>, StoreError> {
        Ok(self.table.get(identity).map(|r| r.value().clone()))
    }

    fn upsert(
        &self,
        identity: &str,
        now: Instant,
        update: &mut dyn FnMut(&mut ClientRecord),
    ) -> Result<ClientRecord, StoreError> {
        let mut entry = self
            .table
            .entry(identity.to_string())
            .or_insert_with(|| ClientRecord::new(identity, now));
        update(entry.value_mut());
        Ok(entry.value().clone())
    }

    fn sweep(&self, now: Instant, idle_ttl: Duration) -> usize {
        // collect first so no shard stays locked across the whole pass
        let stale: Vec<String> = self
            .table
            .iter()
            .filter(|it| evictable(it.value(), now, idle_ttl))
            .map(|it| it.key().clone())
            .collect();

        stale
            .into_iter()
            .filter(|k| {
                self.table
                    .remove_if(k, |_, r| evictable(r, now, idle_ttl))
                    .is_some()
            })
            .count()
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}
