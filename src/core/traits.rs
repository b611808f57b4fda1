//! Core traits for the push-based stage system.
//!
//! Elements are pushed from a [`Publisher`] into a [`Subscriber`] only after the
//! subscriber has granted demand through its [`Subscription`]. Demand and
//! cancellation travel upstream, elements and terminal signals travel
//! downstream.
//!
//! The pull-based [`Source`] trait remains available for producers that are
//! easier to write as "give me up to N items"; `SourcePublisher` adapts them
//! onto the push protocol.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// The control handle a publisher hands to its subscriber.
///
/// Both methods may be called from any thread at any time, including from
/// inside the subscriber's own callbacks.
pub trait Subscription: Send + Sync {
    /// Authorize the delivery of `n` more elements.
    ///
    /// `n` must be positive; `u64::MAX` means unbounded. Publishers report a
    /// zero request with [`Error::InvalidDemand`].
    fn request(&self, n: u64);

    /// Stop the flow of elements. May be called any number of times.
    fn cancel(&self);
}

/// Receives the signals of one subscription.
///
/// Calls to `on_subscribe`, `on_next`, `on_error` and `on_complete` are made
/// serially by the publisher; implementations need no internal locking for
/// them.
pub trait Subscriber<T>: Send {
    /// First signal of every subscription, delivered exactly once.
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);

    /// An element, delivered only against previously granted demand.
    fn on_next(&mut self, item: T);

    /// Terminal failure. No signal follows it.
    fn on_error(&mut self, error: Error);

    /// Terminal success. No signal follows it.
    fn on_complete(&mut self);

    /// Conditional view of this subscriber, if it supports `try_on_next`.
    ///
    /// Publishers that can negotiate synchronously use this to skip the
    /// request round-trip for elements the subscriber does not consume.
    fn as_conditional(&mut self) -> Option<&mut dyn ConditionalSubscriber<T>> {
        None
    }
}

/// A subscriber that reports whether a pushed element was consumed.
pub trait ConditionalSubscriber<T>: Subscriber<T> {
    /// Offer an element. Returns `false` if it did not consume the demand
    /// unit, leaving the publisher free to emit another element in its place.
    fn try_on_next(&mut self, item: T) -> bool;
}

/// A producer of elements that any number of subscribers can attach to.
pub trait Publisher {
    /// The type of elements this publisher emits
    type Item: Send + 'static;

    /// Attach a subscriber. Every call starts an independent subscription.
    fn subscribe<S>(&self, subscriber: S)
    where
        S: Subscriber<Self::Item> + 'static;
}

impl<T, S> Subscriber<T> for Box<S>
where
    S: Subscriber<T> + ?Sized,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        (**self).on_subscribe(subscription)
    }

    fn on_next(&mut self, item: T) {
        (**self).on_next(item)
    }

    fn on_error(&mut self, error: Error) {
        (**self).on_error(error)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }

    fn as_conditional(&mut self) -> Option<&mut dyn ConditionalSubscriber<T>> {
        (**self).as_conditional()
    }
}

/// A source generates items on demand, in batches no larger than requested.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use streamgate::core::Source;
/// use streamgate::Result;
///
/// struct CounterSource {
///     current: u64,
///     max: u64,
/// }
///
/// #[async_trait]
/// impl Source for CounterSource {
///     type Item = u64;
///
///     async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
///         let mut items = Vec::with_capacity(demand);
///         while items.len() < demand && self.current <= self.max {
///             items.push(self.current);
///             self.current += 1;
///         }
///         Ok(items)
///     }
/// }
/// ```
#[async_trait]
pub trait Source {
    /// The type of items this source generates
    type Item: Send + 'static;

    /// Return up to `demand` items. An empty Vec means the source is exhausted.
    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>>;

    /// Get the next single item (convenience method).
    async fn next(&mut self) -> Result<Option<Self::Item>> {
        let items = self.handle_demand(1).await?;
        Ok(items.into_iter().next())
    }
}
