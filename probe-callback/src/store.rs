//! Read-once correlation store

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Slot that always holds the most recent delivery
pub const LAST_KEY: &str = "last";

/// Slot for deliveries that carry no correlation identifier
pub const UNKNOWN_KEY: &str = "unknown";

/// Fields consulted for the correlation identifier, in priority order
const CORRELATION_FIELDS: [&str; 2] = ["correlationId", "taskId"];

/// A JSON object delivered by the system under test
pub type CallbackRecord = Map<String, Value>;

/// Extract the correlation key of a record.
///
/// Non-empty strings and numbers count as identifiers; anything else falls
/// through to the next field and finally to [`UNKNOWN_KEY`].
pub fn correlation_key(record: &CallbackRecord) -> String {
    CORRELATION_FIELDS
        .iter()
        .filter_map(|field| match record.get(*field) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .next()
        .unwrap_or_else(|| UNKNOWN_KEY.to_string())
}

/// Thread-safe map from correlation key to the latest delivery for that key.
///
/// Cloning is cheap and every clone shares the same map. All mutation happens
/// under one mutex: an insert writes its key and [`LAST_KEY`] in a single
/// critical section, and [`take`](Self::take) removes in the same section it
/// reads, so no record reaches two consumers.
#[derive(Debug, Clone)]
pub struct CorrelationStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    records: Mutex<HashMap<String, CallbackRecord>>,
    inserted: Notify,
    poll_interval: Duration,
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

impl CorrelationStore {
    /// Create an empty store; `poll_interval` bounds how long a waiter can
    /// miss an insert notification
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                records: Mutex::new(HashMap::new()),
                inserted: Notify::new(),
                poll_interval: poll_interval.max(Duration::from_millis(1)),
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// File a delivery under its correlation key and under [`LAST_KEY`].
    /// Returns the correlation key.
    pub fn insert(&self, record: CallbackRecord) -> String {
        let key = correlation_key(&record);
        {
            let mut records = self.records();
            records.insert(LAST_KEY.to_string(), record.clone());
            records.insert(key.clone(), record);
        }
        self.inner.inserted.notify_waiters();
        debug!("Stored callback under '{}'", key);
        key
    }

    /// Remove and return the record under `key`, if present
    pub fn take(&self, key: &str) -> Option<CallbackRecord> {
        self.records().remove(key)
    }

    /// Whether a record is waiting under `key`; does not consume it
    pub fn contains(&self, key: &str) -> bool {
        self.records().contains_key(key)
    }

    /// Number of occupied slots, [`LAST_KEY`] included
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until `key` is present, then remove and return its record.
    ///
    /// Returns `None` once `timeout` has elapsed without a delivery. Wakes on
    /// every insert, and re-checks at least once per poll interval.
    pub async fn wait_for(&self, key: &str, timeout: Duration) -> Option<CallbackRecord> {
        // A timeout too large to represent means waiting without a deadline
        let deadline = Instant::now().checked_add(timeout);

        loop {
            // Register interest before checking so an insert between the
            // check and the sleep still wakes us
            let notified = self.inner.inserted.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = self.take(key) {
                return Some(record);
            }

            let step = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!("No callback for '{}' within {:?}", key, timeout);
                        return None;
                    }
                    self.inner.poll_interval.min(deadline - now)
                }
                None => self.inner.poll_interval,
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep(step) => {}
            }
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, CallbackRecord>> {
        // The map is never left half-written, so a poisoned lock is still usable
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
