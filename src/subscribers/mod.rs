//! Subscriber implementations for the streamgate library.
//!
//! This module provides concrete subscribers that sit at the end of a
//! pipeline and record what reaches them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

use crate::core::{Subscriber, Subscription};
use crate::error::Error;
use crate::util::UNBOUNDED;

/// One signal as received by a subscriber.
#[derive(Debug, Clone)]
pub enum Signal<T> {
    Next(T),
    Error(Error),
    Complete,
}

struct Shared<T> {
    signals: Mutex<Vec<Signal<T>>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    finished: AtomicBool,
    done: Notify,
}

impl<T> Shared<T> {
    fn push(&self, signal: Signal<T>) {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal);
    }

    fn subscription(&self) -> Option<Arc<dyn Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
        self.done.notify_waiters();
    }
}

/// A subscriber that records every signal.
///
/// It requests `initial_demand` elements when subscribed; further demand is
/// granted through its [`CollectHandle`].
pub struct CollectSubscriber<T> {
    shared: Arc<Shared<T>>,
    initial_demand: u64,
}

impl<T> CollectSubscriber<T> {
    /// Create a collector that requests `initial_demand` on subscribe (0 for none)
    pub fn new(initial_demand: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                signals: Mutex::new(Vec::new()),
                subscription: Mutex::new(None),
                finished: AtomicBool::new(false),
                done: Notify::new(),
            }),
            initial_demand,
        }
    }

    /// Create a collector that requests everything up front
    pub fn unbounded() -> Self {
        Self::new(UNBOUNDED)
    }

    /// Get a handle for inspecting and driving this collector
    pub fn handle(&self) -> CollectHandle<T> {
        CollectHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for CollectSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        *self
            .shared
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&subscription));
        if self.initial_demand > 0 {
            subscription.request(self.initial_demand);
        }
    }

    fn on_next(&mut self, item: T) {
        self.shared.push(Signal::Next(item));
    }

    fn on_error(&mut self, error: Error) {
        self.shared.push(Signal::Error(error));
        self.shared.finish();
    }

    fn on_complete(&mut self) {
        self.shared.push(Signal::Complete);
        self.shared.finish();
    }
}

/// Shared view of a [`CollectSubscriber`].
pub struct CollectHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CollectHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> CollectHandle<T> {
    /// Request `n` more elements from upstream. No-op before subscription.
    pub fn request(&self, n: u64) {
        if let Some(subscription) = self.shared.subscription() {
            subscription.request(n);
        }
    }

    /// Cancel the upstream. No-op before subscription.
    pub fn cancel(&self) {
        if let Some(subscription) = self.shared.subscription() {
            subscription.cancel();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.subscription().is_some()
    }

    /// Whether a terminal signal has arrived
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    pub fn is_completed(&self) -> bool {
        self.shared
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|s| matches!(s, Signal::Complete))
    }

    /// Errors received, oldest first
    pub fn errors(&self) -> Vec<Error> {
        self.shared
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|s| match s {
                Signal::Error(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait until `on_error` or `on_complete` has been received.
    pub async fn finished(&self) {
        loop {
            let notified = self.shared.done.notified();
            if self.is_finished() {
                return;
            }
            notified.await;
        }
    }
}

impl<T: Clone> CollectHandle<T> {
    /// Elements received so far
    pub fn items(&self) -> Vec<T> {
        self.shared
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|s| match s {
                Signal::Next(item) => Some(item.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every signal received so far
    pub fn signals(&self) -> Vec<Signal<T>> {
        self.shared
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[derive(Default)]
    struct Upstream {
        requested: AtomicU64,
        cancelled: AtomicBool,
    }

    impl Subscription for Upstream {
        fn request(&self, n: u64) {
            self.requested.fetch_add(n, Ordering::SeqCst);
        }

        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_initial_demand_and_handle() {
        let mut collector = CollectSubscriber::<u8>::new(3);
        let handle = collector.handle();
        let upstream = Arc::new(Upstream::default());

        handle.request(10);
        assert!(!handle.is_subscribed());

        collector.on_subscribe(upstream.clone());
        assert_eq!(upstream.requested.load(Ordering::SeqCst), 3);

        handle.request(2);
        handle.cancel();
        assert_eq!(upstream.requested.load(Ordering::SeqCst), 5);
        assert!(upstream.cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn test_records_signals_in_order() {
        let mut collector = CollectSubscriber::new(0);
        let handle = collector.handle();

        collector.on_next("a");
        collector.on_next("b");
        collector.on_error(Error::custom("bad"));

        assert_eq!(handle.items(), vec!["a", "b"]);
        assert_eq!(handle.errors().len(), 1);
        assert!(handle.is_finished());
        assert!(!handle.is_completed());
    }

    #[tokio::test]
    async fn test_finished_wakes_waiter() {
        let collector = CollectSubscriber::<i32>::new(0);
        let handle = collector.handle();

        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.finished().await }
        });

        let mut collector = collector;
        tokio::task::yield_now().await;
        collector.on_complete();

        waiter.await.unwrap();
        assert!(handle.is_completed());
    }
}
