//! Stages that sit between a publisher and a subscriber.

mod gate;
pub mod skip_until;

use std::convert::Infallible;

use crate::core::Publisher;
use crate::error::BoxError;

pub use skip_until::{PredicateFn, SkipUntil, SkipUntilSubscriber, SkipUntilSubscription};

/// Extension trait for composing publishers with stages.
pub trait PublisherExt: Publisher + Sized {
    /// Suppress elements until `predicate` first matches, then pass everything.
    fn skip_until<F>(self, predicate: F) -> SkipUntil<Self>
    where
        F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        SkipUntil::new(self, move |item: &Self::Item| {
            Ok::<bool, Infallible>(predicate(item))
        })
    }

    /// Like [`skip_until`](PublisherExt::skip_until) with a fallible predicate.
    ///
    /// A predicate error cancels the upstream and terminates the subscription
    /// with [`Error::Operator`](crate::Error::Operator).
    fn try_skip_until<F, E>(self, predicate: F) -> SkipUntil<Self>
    where
        F: Fn(&Self::Item) -> std::result::Result<bool, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        SkipUntil::new(self, predicate)
    }
}

impl<P: Publisher> PublisherExt for P {}
