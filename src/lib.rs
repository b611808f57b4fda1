//! # Demand-driven push stages for Rust
//!
//! This crate provides push-based stream stages that speak a backpressured
//! subscription protocol: a publisher emits only what its subscriber has
//! requested, and the subscriber may cancel at any time.
//!
//! ## Core Concepts
//!
//! - **Publisher**: emits elements to subscribers against granted demand
//! - **Subscriber**: receives `on_subscribe`, `on_next`, `on_error`, `on_complete`
//! - **Subscription**: the handle carrying `request(n)` and `cancel()` upstream
//! - **Stage**: a subscriber that is also the subscription of the next one
//!
//! The [`SkipUntil`](operators::SkipUntil) stage suppresses elements until a
//! predicate first matches and then passes everything through, replacing each
//! suppressed element's demand so the downstream never notices.
//!
//! ## Example
//!
//! ```rust
//! use streamgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let collector = CollectSubscriber::new(3);
//!     let handle = collector.handle();
//!
//!     SourcePublisher::new(|| RangeSource::new(1..101))
//!         .skip_until(|x: &i64| *x > 50)
//!         .subscribe(collector);
//!
//!     while handle.items().len() < 3 {
//!         tokio::task::yield_now().await;
//!     }
//!     assert_eq!(handle.items(), vec![51, 52, 53]);
//!     handle.cancel();
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod hooks;
pub mod operators;
pub mod publishers;
pub mod sources;
pub mod subscribers;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::config::StageConfig;
    pub use crate::core::{
        ConditionalSubscriber, Introspect, Phase, Publisher, Source, StageSnapshot, Subscriber,
        Subscription,
    };
    pub use crate::error::{Error, Result};
    pub use crate::hooks::{DropSink, LoggingDropSink, RecordingDropSink};
    pub use crate::operators::{PublisherExt, SkipUntil, SkipUntilSubscriber};
    pub use crate::publishers::{from_iter, IterPublisher, SourcePublisher};
    pub use crate::sources::{RangeSource, StreamSource, VecSource};
    pub use crate::subscribers::{CollectHandle, CollectSubscriber, Signal};
}

// Re-export main error type
pub use error::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
