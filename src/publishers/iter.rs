//! Synchronous publisher over an iterator.

use std::iter::Peekable;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::core::{Publisher, Subscriber, Subscription};
use crate::error::Error;
use crate::util::{add_demand, produced, validate_demand, UNBOUNDED};

/// Emits the items of a fresh iterator to every subscriber, honouring demand.
///
/// Emission happens on whichever thread grants demand. A `request` made from
/// inside `on_next` only records the demand; the emitting loop picks it up, so
/// the call stack never grows with the number of elements.
pub struct IterPublisher<F> {
    factory: F,
    fuseable: bool,
}

impl<F, I> IterPublisher<F>
where
    F: Fn() -> I,
    I: IntoIterator,
{
    /// Create a publisher that calls `factory` once per subscription
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            fuseable: false,
        }
    }

    /// Use `try_on_next` on subscribers that expose a conditional view.
    ///
    /// Elements a conditional subscriber does not consume do not count
    /// against demand.
    pub fn fuseable(mut self, fuseable: bool) -> Self {
        self.fuseable = fuseable;
        self
    }
}

/// Publisher over a cloneable collection.
pub fn from_iter<I>(items: I) -> IterPublisher<impl Fn() -> I>
where
    I: IntoIterator + Clone,
{
    IterPublisher::new(move || items.clone())
}

impl<F, I> Publisher for IterPublisher<F>
where
    F: Fn() -> I,
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Self::Item> + 'static,
    {
        IterSubscription::start((self.factory)().into_iter(), subscriber, self.fuseable);
    }
}

struct Emitter<It: Iterator, S> {
    iter: Peekable<It>,
    subscriber: S,
}

enum Flow {
    /// Out of demand; wait for the next request
    Idle,
    /// Terminated or cancelled; release the emitter
    Done,
}

struct IterSubscription<It: Iterator, S> {
    requested: AtomicU64,
    wip: AtomicU64,
    cancelled: AtomicBool,
    bad_request: AtomicBool,
    fuseable: bool,
    emitter: Mutex<Option<Emitter<It, S>>>,
}

impl<It, S> IterSubscription<It, S>
where
    It: Iterator + Send + 'static,
    It::Item: Send + 'static,
    S: Subscriber<It::Item> + 'static,
{
    fn start(iter: It, mut subscriber: S, fuseable: bool) {
        // `wip` starts claimed so requests made during the handshake only
        // accumulate until the emitter is installed.
        let subscription = Arc::new(Self {
            requested: AtomicU64::new(0),
            wip: AtomicU64::new(1),
            cancelled: AtomicBool::new(false),
            bad_request: AtomicBool::new(false),
            fuseable,
            emitter: Mutex::new(None),
        });

        subscriber.on_subscribe(subscription.clone());
        *subscription.lock() = Some(Emitter {
            iter: iter.peekable(),
            subscriber,
        });
        subscription.drain();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Emitter<It, S>>> {
        self.emitter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            self.drain();
        }
    }

    /// Only the caller that moved `wip` off zero runs this, so the emitter
    /// lock is never contended or re-entered.
    fn drain(&self) {
        let mut missed = 1;
        loop {
            {
                let mut slot = self.lock();
                if let Some(emitter) = slot.as_mut() {
                    if let Flow::Done = self.emit(emitter) {
                        *slot = None;
                    }
                }
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn emit(&self, emitter: &mut Emitter<It, S>) -> Flow {
        let mut emitted = 0u64;
        let mut requested = self.requested.load(Ordering::Acquire);

        loop {
            if let Some(flow) = self.check_terminated(emitter) {
                return flow;
            }

            while requested == UNBOUNDED || emitted != requested {
                let Some(item) = emitter.iter.next() else {
                    break;
                };

                let consumed = if self.fuseable {
                    match emitter.subscriber.as_conditional() {
                        Some(conditional) => conditional.try_on_next(item),
                        None => {
                            emitter.subscriber.on_next(item);
                            true
                        }
                    }
                } else {
                    emitter.subscriber.on_next(item);
                    true
                };
                if consumed {
                    emitted += 1;
                }

                if let Some(flow) = self.check_terminated(emitter) {
                    return flow;
                }
            }

            if emitter.iter.peek().is_none() {
                // Re-check so a cancel racing the last element suppresses completion.
                if let Some(flow) = self.check_terminated(emitter) {
                    return flow;
                }
                trace!("iterator exhausted");
                emitter.subscriber.on_complete();
                return Flow::Done;
            }

            requested = produced(&self.requested, emitted);
            if requested == 0 {
                return Flow::Idle;
            }
            emitted = 0;
        }
    }

    /// Handles cancellation, a rejected request and an empty iterator.
    fn check_terminated(&self, emitter: &mut Emitter<It, S>) -> Option<Flow> {
        if self.bad_request.swap(false, Ordering::AcqRel) {
            self.cancelled.store(true, Ordering::Release);
            emitter
                .subscriber
                .on_error(Error::InvalidDemand { requested: 0 });
            return Some(Flow::Done);
        }
        if self.cancelled.load(Ordering::Acquire) {
            return Some(Flow::Done);
        }
        None
    }
}

impl<It, S> Subscription for IterSubscription<It, S>
where
    It: Iterator + Send + 'static,
    It::Item: Send + 'static,
    S: Subscriber<It::Item> + 'static,
{
    fn request(&self, n: u64) {
        match validate_demand(n) {
            Ok(n) => {
                add_demand(&self.requested, n);
            }
            Err(_) => self.bad_request.store(true, Ordering::Release),
        }
        self.schedule();
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            // Let the draining side release the subscriber.
            self.schedule();
        }
    }
}
