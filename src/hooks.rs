//! Process-wide sink for signals that arrive after a subscription terminated.
//!
//! A late element, error or completion is not a pipeline failure. It is
//! handed to a [`DropSink`] for observability and otherwise discarded. The
//! default sink logs through `tracing`; a different one can be installed
//! globally with [`set_global`] or per stage through
//! [`StageConfig`](crate::config::StageConfig).

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::Error;

/// Receives signals dropped by terminated stages. Must never panic.
pub trait DropSink: Send + Sync {
    /// An element arrived after termination.
    fn next_dropped(&self, item: &dyn Any);

    /// An error arrived after termination, or a protocol violation was
    /// detected that has no subscriber left to report to.
    fn error_dropped(&self, error: &Error);

    /// A completion arrived after termination.
    fn complete_dropped(&self) {}
}

/// Logs dropped signals at debug level, protocol violations at warn.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDropSink;

impl DropSink for LoggingDropSink {
    fn next_dropped(&self, _item: &dyn Any) {
        debug!("element dropped after termination");
        #[cfg(feature = "metrics")]
        metrics::counter!("streamgate.dropped.next").increment(1);
    }

    fn error_dropped(&self, error: &Error) {
        if error.is_protocol_violation() {
            warn!(%error, "protocol violation with no subscriber to report to");
        } else {
            debug!(%error, "error dropped after termination");
        }
        #[cfg(feature = "metrics")]
        metrics::counter!("streamgate.dropped.error").increment(1);
    }

    fn complete_dropped(&self) {
        tracing::trace!("completion dropped after termination");
        #[cfg(feature = "metrics")]
        metrics::counter!("streamgate.dropped.complete").increment(1);
    }
}

/// Counts dropped signals and keeps dropped errors.
#[derive(Debug, Default)]
pub struct RecordingDropSink {
    next: AtomicUsize,
    complete: AtomicUsize,
    errors: Mutex<Vec<Error>>,
}

impl RecordingDropSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dropped elements
    pub fn dropped_next(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    /// Number of dropped completions
    pub fn dropped_complete(&self) -> usize {
        self.complete.load(Ordering::SeqCst)
    }

    /// Clone of the dropped errors, oldest first
    pub fn dropped_errors(&self) -> Vec<Error> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DropSink for RecordingDropSink {
    fn next_dropped(&self, _item: &dyn Any) {
        self.next.fetch_add(1, Ordering::SeqCst);
    }

    fn error_dropped(&self, error: &Error) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }

    fn complete_dropped(&self) {
        self.complete.fetch_add(1, Ordering::SeqCst);
    }
}

static GLOBAL: RwLock<Option<Arc<dyn DropSink>>> = RwLock::new(None);

/// Install `sink` as the process-wide drop sink.
pub fn set_global(sink: Arc<dyn DropSink>) {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
}

/// Restore the default [`LoggingDropSink`].
pub fn reset_global() {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// The currently installed process-wide drop sink.
pub fn global() -> Arc<dyn DropSink> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_else(|| Arc::new(LoggingDropSink))
}
