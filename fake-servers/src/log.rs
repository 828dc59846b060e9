//! Record of every request a fake served.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type Sink = Arc<dyn Fn(&RecordedRequest) + Send + Sync>;

/// One served request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    /// Request method.
    pub method: String,
    /// Request path, query excluded.
    pub path: String,
    /// Status sent back.
    pub status: u16,
    /// Whether a declared route handled the request.
    pub matched: bool,
}

/// Shared, append-only request log. Cloning shares the same log.
#[derive(Clone, Default)]
pub struct RequestLog {
    entries: Arc<Mutex<Vec<RecordedRequest>>>,
    sink: Option<Sink>,
}

impl RequestLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty log that also hands every new entry to `sink`, in record
    /// order, before the response goes out.
    pub fn with_sink<F>(sink: F) -> Self
    where
        F: Fn(&RecordedRequest) + Send + Sync + 'static,
    {
        Self {
            entries: Arc::default(),
            sink: Some(Arc::new(sink)),
        }
    }

    /// Append an entry.
    pub fn record(&self, entry: RecordedRequest) {
        if let Some(sink) = &self.sink {
            sink(&entry);
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Copy of every entry so far.
    pub fn snapshot(&self) -> Vec<RecordedRequest> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries that no declared route handled.
    pub fn unmatched(&self) -> Vec<RecordedRequest> {
        self.snapshot().into_iter().filter(|r| !r.matched).collect()
    }
}

impl fmt::Debug for RequestLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLog")
            .field("entries", &self.snapshot().len())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
