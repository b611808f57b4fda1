//! Core traits and types for the streamgate library.
//!
//! This module contains the protocol traits that every publisher, stage and
//! subscriber speaks, plus the introspection capability.

pub mod introspect;
pub mod traits;

// Re-export core items
pub use crate::error::{Error, Result};
pub use introspect::{Introspect, Phase, StageSnapshot};
pub use traits::{ConditionalSubscriber, Publisher, Source, Subscriber, Subscription};
