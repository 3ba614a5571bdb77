use anyhow::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::contracts::ActivitySink;
use crate::model::{ActivityEntry, AdminContext};

const DEFAULT_CAPACITY: usize = 500;

/// Bounded ring buffer keeping the most recent entries, oldest first.
#[derive(Debug)]
pub struct InMemoryActivitySink {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl InMemoryActivitySink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Most recent entries first, optionally filtered by action prefix.
    pub fn recent(&self, limit: usize, action_prefix: Option<&str>) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|e| action_prefix.map_or(true, |p| e.action.starts_with(p)))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryActivitySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ActivitySink for InMemoryActivitySink {
    async fn record(&self, _ctx: &AdminContext, entry: ActivityEntry) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(())
    }
}

/// Writes every entry to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogActivitySink;

#[async_trait::async_trait]
impl ActivitySink for LogActivitySink {
    async fn record(&self, _ctx: &AdminContext, entry: ActivityEntry) -> Result<()> {
        log::info!(
            target: "admin::activity",
            "{} {} {} {}",
            entry.actor,
            entry.action,
            entry.object,
            serde_json::Value::Object(entry.metadata)
        );
        Ok(())
    }
}
