//! Publisher implementations for the streamgate library.
//!
//! These are the producers that start a pipeline: one over plain iterators,
//! emitting synchronously on the requesting thread, and one that drives an
//! async [`Source`](crate::core::Source) on a tokio task.

pub mod iter;
pub mod source;

pub use iter::{from_iter, IterPublisher};
pub use source::{SourcePublisher, DEFAULT_BATCH_SIZE};
