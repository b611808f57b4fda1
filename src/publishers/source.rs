//! Publisher that drives an async [`Source`] on a tokio task.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::core::{Publisher, Source, Subscriber, Subscription};
use crate::error::Error;
use crate::util::{validate_demand, UNBOUNDED};

/// Default upper bound on a single `handle_demand` call.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Pushes the items of a fresh [`Source`] to every subscriber.
///
/// Each subscription gets its own task. Demand arrives over a channel, so
/// `request` and `cancel` never block and may be called from inside the
/// subscriber's callbacks.
pub struct SourcePublisher<F> {
    factory: F,
    batch_size: usize,
}

impl<F, Src> SourcePublisher<F>
where
    F: Fn() -> Src,
    Src: Source,
{
    /// Create a publisher that calls `factory` once per subscription
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the largest batch requested from the source at once
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }
}

impl<F, Src> Publisher for SourcePublisher<F>
where
    F: Fn() -> Src,
    Src: Source + Send + 'static,
{
    type Item = Src::Item;

    fn subscribe<S>(&self, mut subscriber: S)
    where
        S: Subscriber<Self::Item> + 'static,
    {
        let (demand_tx, demand_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let subscription = Arc::new(SourceSubscription {
            demand: demand_tx,
            token: token.clone(),
        });

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                subscriber.on_subscribe(subscription);
                subscriber.on_error(Error::NoRuntime);
                return;
            }
        };

        let driver = Driver {
            source: (self.factory)(),
            subscriber,
            demand: demand_rx,
            token,
            batch_size: self.batch_size,
            outstanding: 0,
        };
        runtime.spawn(driver.run(subscription));
    }
}

struct SourceSubscription {
    demand: mpsc::UnboundedSender<u64>,
    token: CancellationToken,
}

impl Subscription for SourceSubscription {
    fn request(&self, n: u64) {
        // The driver is gone once the subscription terminated.
        let _ = self.demand.send(n);
    }

    fn cancel(&self) {
        self.token.cancel();
    }
}

struct Driver<Src, S> {
    source: Src,
    subscriber: S,
    demand: mpsc::UnboundedReceiver<u64>,
    token: CancellationToken,
    batch_size: usize,
    outstanding: u64,
}

impl<Src, S> Driver<Src, S>
where
    Src: Source + Send + 'static,
    S: Subscriber<Src::Item> + 'static,
{
    async fn run(mut self, subscription: Arc<SourceSubscription>) {
        self.subscriber.on_subscribe(subscription);

        loop {
            if !self.absorb_pending() {
                return;
            }
            if self.token.is_cancelled() {
                trace!("source subscription cancelled");
                return;
            }

            if self.outstanding == 0 {
                tokio::select! {
                    _ = self.token.cancelled() => return,
                    next = self.demand.recv() => match next {
                        Some(n) => {
                            if !self.add_demand(n) {
                                return;
                            }
                        }
                        None => return,
                    },
                }
                continue;
            }

            let want = self.outstanding.min(self.batch_size as u64) as usize;
            let batch = tokio::select! {
                _ = self.token.cancelled() => return,
                batch = self.source.handle_demand(want) => batch,
            };

            match batch {
                Ok(items) if items.is_empty() => {
                    if !self.token.is_cancelled() {
                        debug!("source exhausted");
                        self.subscriber.on_complete();
                    }
                    return;
                }
                Ok(items) if items.len() > want => {
                    self.token.cancel();
                    let error = Error::Overproduced {
                        requested: want,
                        produced: items.len(),
                    };
                    warn!(%error, "source ignored its demand");
                    self.subscriber.on_error(error);
                    return;
                }
                Ok(items) => {
                    for item in items {
                        if self.token.is_cancelled() {
                            return;
                        }
                        if self.outstanding != UNBOUNDED {
                            self.outstanding = self.outstanding.saturating_sub(1);
                        }
                        self.subscriber.on_next(item);
                    }
                }
                Err(error) => {
                    if !self.token.is_cancelled() {
                        debug!(%error, "source failed");
                        self.subscriber.on_error(error);
                    }
                    return;
                }
            }
        }
    }

    /// Drain requests already queued. Returns `false` if the subscription ended.
    fn absorb_pending(&mut self) -> bool {
        while let Ok(n) = self.demand.try_recv() {
            if !self.add_demand(n) {
                return false;
            }
        }
        true
    }

    fn add_demand(&mut self, n: u64) -> bool {
        match validate_demand(n) {
            Ok(n) => {
                self.outstanding = self.outstanding.saturating_add(n);
                true
            }
            Err(error) => {
                self.token.cancel();
                self.subscriber.on_error(error);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::sources::{RangeSource, VecSource};
    use async_trait::async_trait;
    use crate::subscribers::CollectSubscriber;

    #[tokio::test]
    async fn test_emits_all_with_unbounded_demand() {
        let collector = CollectSubscriber::unbounded();
        let handle = collector.handle();

        SourcePublisher::new(|| RangeSource::new(0..10))
            .batch_size(3)
            .subscribe(collector);
        handle.finished().await;

        assert_eq!(handle.items(), (0..10).collect::<Vec<_>>());
        assert!(handle.is_completed());
    }

    #[tokio::test]
    async fn test_honours_bounded_demand() {
        let collector = CollectSubscriber::new(2);
        let handle = collector.handle();

        SourcePublisher::new(|| VecSource::new(vec!["a", "b", "c"])).subscribe(collector);
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(handle.items(), vec!["a", "b"]);

        handle.request(5);
        handle.finished().await;
        assert_eq!(handle.items(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_zero_request_is_an_error() {
        let collector = CollectSubscriber::<i64>::new(0);
        let handle = collector.handle();

        SourcePublisher::new(|| RangeSource::new(0..3)).subscribe(collector);
        while !handle.is_subscribed() {
            tokio::task::yield_now().await;
        }
        handle.request(0);
        handle.finished().await;

        assert!(matches!(
            handle.errors().as_slice(),
            [Error::InvalidDemand { requested: 0 }]
        ));
    }

    /// Always answers with three items, whatever was asked for.
    struct Greedy;

    #[async_trait]
    impl Source for Greedy {
        type Item = u8;

        async fn handle_demand(&mut self, _demand: usize) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let collector = CollectSubscriber::new(1);
        let handle = collector.handle();

        SourcePublisher::new(|| Greedy).subscribe(collector);
        handle.finished().await;

        assert!(handle.items().is_empty());
        assert!(matches!(
            handle.errors().as_slice(),
            [Error::Overproduced {
                requested: 1,
                produced: 3
            }]
        ));
    }

    struct Failing;

    #[async_trait]
    impl Source for Failing {
        type Item = u8;

        async fn handle_demand(&mut self, _demand: usize) -> Result<Vec<u8>> {
            Err(Error::Source(Arc::new(std::io::Error::other("disk gone"))))
        }
    }

    #[tokio::test]
    async fn test_source_failure_is_forwarded() {
        let collector = CollectSubscriber::unbounded();
        let handle = collector.handle();

        SourcePublisher::new(|| Failing).subscribe(collector);
        handle.finished().await;

        let errors = handle.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "source failed: disk gone");
    }

    #[test]
    fn test_without_runtime() {
        let collector = CollectSubscriber::<i64>::new(1);
        let handle = collector.handle();

        SourcePublisher::new(|| RangeSource::new(0..3)).subscribe(collector);

        assert!(handle.is_subscribed());
        assert!(matches!(handle.errors().as_slice(), [Error::NoRuntime]));
    }
}
