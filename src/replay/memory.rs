//! Process-local replay store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::clock::Clock;
use crate::replay::store::{RecordSummary, ReplayError, ReplayStats, ReplayStore, SignatureRecord};

#[derive(Debug)]
pub struct MemoryReplayStore {
    records: DashMap<String, SignatureRecord>,
    clock: Arc<dyn Clock>,
}

impl MemoryReplayStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    /// Records held, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ReplayStore for MemoryReplayStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn is_used(&self, token: &str) -> Result<bool, ReplayError> {
        let now = self.clock.now();
        let live = match self.records.get(token) {
            Some(record) => record.is_live(now),
            None => return Ok(false),
        };
        if !live {
            self.records.remove_if(token, |_, record| !record.is_live(now));
        }
        Ok(live)
    }

    async fn mark_used(&self, token: &str, ttl: Duration) -> Result<(), ReplayError> {
        let now = self.clock.now();
        match self.records.entry(token.to_string()) {
            Entry::Occupied(mut entry) if entry.get().is_live(now) => {
                entry.get_mut().used_at = now;
            }
            Entry::Occupied(mut entry) => {
                entry.insert(SignatureRecord::new(token, now, ttl));
            }
            Entry::Vacant(entry) => {
                entry.insert(SignatureRecord::new(token, now, ttl));
            }
        }
        Ok(())
    }

    async fn check_and_mark(&self, token: &str, ttl: Duration) -> Result<bool, ReplayError> {
        let now = self.clock.now();
        match self.records.entry(token.to_string()) {
            Entry::Occupied(entry) if entry.get().is_live(now) => Ok(false),
            Entry::Occupied(mut entry) => {
                entry.insert(SignatureRecord::new(token, now, ttl));
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(SignatureRecord::new(token, now, ttl));
                Ok(true)
            }
        }
    }

    async fn sweep(&self) -> Result<usize, ReplayError> {
        let now = self.clock.now();
        let before = self.records.len();
        self.records.retain(|_, record| record.is_live(now));
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.records.len(), "Swept expired signatures");
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize, ReplayError> {
        let count = self.records.len();
        self.records.clear();
        tracing::info!(count, "Cleared replay store");
        Ok(count)
    }

    async fn stats(&self) -> Result<ReplayStats, ReplayError> {
        let now = self.clock.now();
        let records: Vec<RecordSummary> = self
            .records
            .iter()
            .filter(|r| r.is_live(now))
            .map(|r| RecordSummary::from(r.value()))
            .collect();
        Ok(ReplayStats {
            total: records.len(),
            records,
        })
    }
}
