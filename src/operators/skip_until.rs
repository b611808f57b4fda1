//! The skip-until stage.
//!
//! Elements are suppressed until the predicate first matches; from that
//! element on everything passes through untouched. Each suppressed element
//! consumed one unit of the downstream's demand, so the stage asks upstream
//! for a replacement to keep the downstream's accounting exact.
//!
//! ```rust
//! use streamgate::prelude::*;
//!
//! let collector = CollectSubscriber::unbounded();
//! let handle = collector.handle();
//!
//! from_iter(vec![1, 3, 5, 4, 6, 7])
//!     .skip_until(|x: &i32| x % 2 == 0)
//!     .subscribe(collector);
//!
//! assert_eq!(handle.items(), vec![4, 6, 7]);
//! assert!(handle.is_completed());
//! ```

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::StageConfig;
use crate::core::{
    ConditionalSubscriber, Introspect, Publisher, StageSnapshot, Subscriber, Subscription,
};
use crate::error::{map_operator_error, BoxError, Error};
use crate::hooks::DropSink;
use crate::operators::gate::{GateState, UpstreamSlot};

/// A shared, fallible element predicate.
pub type PredicateFn<T> =
    Arc<dyn Fn(&T) -> std::result::Result<bool, BoxError> + Send + Sync>;

/// Blueprint binding a predicate to an upstream publisher.
///
/// Immutable and reusable: every [`Publisher::subscribe`] call builds a fresh
/// [`SkipUntilSubscriber`] with its own gate.
pub struct SkipUntil<P>
where
    P: Publisher,
{
    source: P,
    predicate: PredicateFn<P::Item>,
    config: StageConfig,
}

impl<P> SkipUntil<P>
where
    P: Publisher,
{
    /// Create a new skip-until blueprint with a fallible predicate
    pub fn new<F, E>(source: P, predicate: F) -> Self
    where
        F: Fn(&P::Item) -> std::result::Result<bool, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            source,
            predicate: Arc::new(
                move |item: &P::Item| -> std::result::Result<bool, BoxError> {
                    predicate(item).map_err(Into::into)
                },
            ),
            config: StageConfig::default(),
        }
    }

    /// Set the name used in logs and snapshots
    pub fn name(mut self, name: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        self.config = self.config.with_name(name);
        self
    }

    /// Route this stage's dropped signals to `sink` instead of the global one
    pub fn drop_sink(mut self, sink: Arc<dyn DropSink>) -> Self {
        self.config = self.config.with_drop_sink(sink);
        self
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn predicate(&self) -> &PredicateFn<P::Item> {
        &self.predicate
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }
}

impl<P> Publisher for SkipUntil<P>
where
    P: Publisher,
    P::Item: Sync,
{
    type Item = P::Item;

    fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Self::Item> + 'static,
    {
        let stage =
            SkipUntilSubscriber::new(subscriber, Arc::clone(&self.predicate), self.config.clone());
        self.source.subscribe(stage);
    }
}

/// How the element reached the stage, and so how "not consumed" is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// `on_next`: a skipped element is replaced by requesting one more upstream
    Unconditional,
    /// `try_on_next`: a skipped element is reported through the return value
    Conditional,
}

/// The runtime half of [`SkipUntil`], one per subscription.
pub struct SkipUntilSubscriber<T, S> {
    actual: S,
    predicate: PredicateFn<T>,
    state: GateState,
    config: StageConfig,
}

impl<T, S> SkipUntilSubscriber<T, S>
where
    T: Send + Sync + 'static,
    S: Subscriber<T>,
{
    pub fn new(actual: S, predicate: PredicateFn<T>, config: StageConfig) -> Self {
        Self {
            actual,
            predicate,
            state: GateState::new(),
            config,
        }
    }

    /// The handle this stage gives its downstream.
    ///
    /// Available before `on_subscribe`. Requests and a cancel issued through
    /// it early are applied to the upstream as soon as one is bound.
    pub fn subscription(&self) -> Arc<dyn Subscription> {
        Arc::new(SkipUntilSubscription {
            upstream: Arc::clone(&self.state.upstream),
        })
    }

    fn drop_sink(&self) -> Arc<dyn DropSink> {
        self.config.drop_sink()
    }

    /// Single state transition for both delivery paths. Returns whether the
    /// element consumed its unit of demand.
    fn dispatch(&mut self, item: T, mode: Delivery) -> bool {
        if self.state.is_terminal() {
            self.drop_sink().next_dropped(&item);
            return true;
        }

        if self.state.is_open() {
            self.actual.on_next(item);
            return true;
        }

        let matched = match (self.predicate)(&item) {
            Ok(matched) => matched,
            Err(fault) => {
                let upstream = self.state.upstream.get().map(|s| s.as_ref());
                let error = map_operator_error(upstream, fault, item);
                self.on_error(error);
                return true;
            }
        };

        // A match opens the gate on `on_next` but is skipped on `try_on_next`.
        let opens = match mode {
            Delivery::Unconditional => matched,
            Delivery::Conditional => !matched,
        };

        if opens {
            self.state.open();
            debug!(stage = %self.config.name, "gate opened");
            #[cfg(feature = "metrics")]
            metrics::counter!("streamgate.gate.opened").increment(1);
            self.actual.on_next(item);
            return true;
        }

        match mode {
            Delivery::Unconditional => {
                self.state.upstream.request(1);
                true
            }
            Delivery::Conditional => false,
        }
    }
}

impl<T, S> Subscriber<T> for SkipUntilSubscriber<T, S>
where
    T: Send + Sync + 'static,
    S: Subscriber<T>,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        let slot = Arc::clone(&self.state.upstream);

        let binding = match slot.bind(subscription) {
            Ok(binding) => binding,
            Err(rejected) => {
                warn!(stage = %self.config.name, "rejected duplicate on_subscribe");
                rejected.cancel();
                self.drop_sink().error_dropped(&Error::DuplicateSubscription);
                return;
            }
        };

        if binding.cancelled {
            debug!(stage = %self.config.name, "cancelled before subscription");
            self.state.terminate();
            slot.cancel();
            return;
        }

        trace!(stage = %self.config.name, "subscribed");
        self.actual.on_subscribe(self.subscription());

        if !binding.requests.is_empty() {
            debug!(
                stage = %self.config.name,
                requests = binding.requests.len(),
                "forwarding demand granted before subscription"
            );
            for n in binding.requests {
                slot.request(n);
            }
        }
    }

    fn on_next(&mut self, item: T) {
        self.dispatch(item, Delivery::Unconditional);
    }

    fn on_error(&mut self, error: Error) {
        if !self.state.terminate() {
            self.drop_sink().error_dropped(&error);
            return;
        }
        debug!(stage = %self.config.name, %error, "terminated with error");
        self.actual.on_error(error);
    }

    fn on_complete(&mut self) {
        if !self.state.terminate() {
            self.drop_sink().complete_dropped();
            return;
        }
        trace!(stage = %self.config.name, "completed");
        self.actual.on_complete();
    }

    fn as_conditional(&mut self) -> Option<&mut dyn ConditionalSubscriber<T>> {
        Some(self)
    }
}

impl<T, S> ConditionalSubscriber<T> for SkipUntilSubscriber<T, S>
where
    T: Send + Sync + 'static,
    S: Subscriber<T>,
{
    fn try_on_next(&mut self, item: T) -> bool {
        self.dispatch(item, Delivery::Conditional)
    }
}

impl<T, S> Introspect for SkipUntilSubscriber<T, S> {
    type Downstream = S;
    type Input = dyn Fn(&T) -> std::result::Result<bool, BoxError> + Send + Sync;

    fn is_started(&self) -> bool {
        self.state.upstream.get().is_some() && !self.state.is_terminal()
    }

    fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }

    fn downstream(&self) -> &S {
        &self.actual
    }

    fn upstream(&self) -> Option<Arc<dyn Subscription>> {
        self.state.upstream.get().cloned()
    }

    fn connected_input(&self) -> &Self::Input {
        &*self.predicate
    }

    fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            name: self.config.name.clone(),
            phase: self.state.phase(),
            started: self.is_started(),
            terminated: self.is_terminated(),
        }
    }
}

/// The subscription a [`SkipUntilSubscriber`] exposes downstream.
///
/// Both calls forward straight to the upstream with no intermediate state.
#[derive(Debug)]
pub struct SkipUntilSubscription {
    upstream: Arc<UpstreamSlot>,
}

impl Subscription for SkipUntilSubscription {
    fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.cancel();
    }
}
