//! Dashboard telemetry sink.
//!
//! The scheduler, its subsystems and its commands publish descriptive state
//! (names, running flags, current/default command names) as key/value writes.
//! The wire protocol of the real dashboard is out of scope; anything that can
//! accept `put(key, value)` can act as the sink.
//!
//! The only inbound path is [`TelemetrySink::take_cancel_requests`]: the
//! dashboard may ask for running commands to be canceled by id, and the
//! scheduler drains that list once per tick.
//!
//! [`MemoryTable`] is an in-process table used by the runner binary and tests.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single published value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    Text(String),
    /// Numeric array.
    NumberArray(Vec<f64>),
    /// Text array.
    TextArray(Vec<String>),
}

/// Fire-and-forget key/value output.
pub trait TelemetrySink: Send {
    /// Write `value` under `key`, replacing any previous value.
    fn put(&mut self, key: &str, value: TableValue);

    /// Drain command ids the dashboard asked to cancel.
    fn take_cancel_requests(&mut self) -> Vec<u32> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
struct TableInner {
    entries: BTreeMap<String, TableValue>,
    cancel_requests: Vec<u32>,
    writes: u64,
}

/// Shared in-memory table.
///
/// Cloning yields another handle onto the same table, so a test can keep
/// one handle while the scheduler owns the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    inner: Arc<Mutex<TableInner>>,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<TableValue> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Read a boolean value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            TableValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Read a text value.
    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            TableValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Read a text array value.
    pub fn get_text_array(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            TableValue::TextArray(v) => Some(v),
            _ => None,
        }
    }

    /// Total number of writes since creation.
    pub fn write_count(&self) -> u64 {
        self.inner.lock().writes
    }

    /// Queue a dashboard cancel request for the given command ids.
    pub fn request_cancel(&self, ids: &[u32]) {
        self.inner.lock().cancel_requests.extend_from_slice(ids);
    }

    /// Serialize every entry as a JSON object (sorted by key).
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.inner.lock().entries)
    }
}

impl TelemetrySink for MemoryTable {
    fn put(&mut self, key: &str, value: TableValue) {
        let mut inner = self.inner.lock();
        inner.writes += 1;
        inner.entries.insert(key.to_string(), value);
    }

    fn take_cancel_requests(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.inner.lock().cancel_requests)
    }
}
