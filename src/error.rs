//! Error types for stages and producers.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

use crate::core::Subscription;

/// Boxed error produced by user callbacks such as predicates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type carried by `on_error` signals.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A stage's user callback failed while handling an element
    #[error("operator callback failed: {source}")]
    Operator {
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
        /// The element being handled when the callback failed
        element: Option<Arc<dyn Any + Send + Sync>>,
    },

    /// A subscriber received a second `on_subscribe`
    #[error("subscriber was already subscribed")]
    DuplicateSubscription,

    /// A subscriber requested a non-positive number of elements
    #[error("demand must be positive, got {requested}")]
    InvalidDemand { requested: u64 },

    /// A source failed to produce items
    #[error("source failed: {0}")]
    Source(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// An async producer was subscribed outside of a tokio runtime
    #[error("no tokio runtime available to drive the producer")]
    NoRuntime,

    /// A source returned more items than were asked of it
    #[error("source produced {produced} items for a demand of {requested}")]
    Overproduced { requested: usize, produced: usize },

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// The element attached to an [`Error::Operator`], if it has type `T`.
    pub fn element<T: Any>(&self) -> Option<&T> {
        match self {
            Error::Operator {
                element: Some(element),
                ..
            } => element.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Whether this error reports a broken protocol rule rather than a data fault.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::DuplicateSubscription
                | Error::InvalidDemand { .. }
                | Error::Overproduced { .. }
        )
    }
}

/// Turns a callback fault into the terminal error for a stage.
///
/// The upstream, when bound, is cancelled first: once the fault is
/// reported no further elements are wanted.
pub fn map_operator_error<T>(
    upstream: Option<&dyn Subscription>,
    fault: BoxError,
    element: T,
) -> Error
where
    T: Send + Sync + 'static,
{
    if let Some(upstream) = upstream {
        upstream.cancel();
    }
    Error::Operator {
        source: Arc::from(fault),
        element: Some(Arc::new(element)),
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSubscription {
        cancels: AtomicUsize,
    }

    impl Subscription for CountingSubscription {
        fn request(&self, _n: u64) {}

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_map_operator_error_cancels_upstream_and_keeps_element() {
        let upstream = CountingSubscription::default();
        let error = map_operator_error(Some(&upstream), "boom".into(), 42u32);

        assert_eq!(upstream.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(error.element::<u32>(), Some(&42));
        assert_eq!(error.element::<i64>(), None);
        assert_eq!(error.to_string(), "operator callback failed: boom");
    }

    #[test]
    fn test_map_operator_error_without_upstream() {
        let error = map_operator_error(None, "unbound".into(), "item");
        assert_eq!(error.element::<&str>(), Some(&"item"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_protocol_violations() {
        assert!(Error::DuplicateSubscription.is_protocol_violation());
        assert!(Error::InvalidDemand { requested: 0 }.is_protocol_violation());
        assert!(Error::Overproduced {
            requested: 1,
            produced: 2
        }
        .is_protocol_violation());
        assert!(!Error::custom("nope").is_protocol_violation());
        assert_eq!(
            Error::InvalidDemand { requested: 0 }.to_string(),
            "demand must be positive, got 0"
        );
    }
}
