use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Last timestamp handed out, so ids minted within the same millisecond still differ
static LAST_ISSUED_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Globally unique download request identifier: `{item_index}_{unix_millis}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Mint a new id for the given item index
    pub fn generate(item_index: usize, now: DateTime<Utc>) -> Self {
        let millis = next_unique_millis(now.timestamp_millis());
        Self(format!("{}_{}", item_index, millis))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn next_unique_millis(candidate: i64) -> i64 {
    let mut last = LAST_ISSUED_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = if candidate > last { candidate } else { last + 1 };
        match LAST_ISSUED_MILLIS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// A user-triggered download of one entry in the currently rendered result list.
///
/// Immutable once queued; the worker consumes it exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadRequest {
    /// Position of the entry in the on-page list at enqueue time
    pub item_index: usize,
    pub title: String,
    pub id: RequestId,
    pub created_at: DateTime<Utc>,
}

impl DownloadRequest {
    pub fn new(item_index: usize, title: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            item_index,
            title: title.into(),
            id: RequestId::generate(item_index, created_at),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_starts_with_index() {
        let request = DownloadRequest::new(7, "Lesson");
        assert!(request.id.as_str().starts_with("7_"));
        assert_eq!(request.title, "Lesson");
    }

    #[test]
    fn test_same_item_twice_gives_distinct_ids() {
        let now = Utc::now();
        let first = RequestId::generate(3, now);
        let second = RequestId::generate(3, now);
        assert_ne!(first, second);
    }
}
