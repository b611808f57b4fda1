//! Source implementations for the streamgate library.
//!
//! Sources are pull-based: they answer "give me up to N items". Wrap one in a
//! [`SourcePublisher`](crate::publishers::SourcePublisher) to push its items
//! through stages under subscriber demand.

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::collections::VecDeque;
use std::ops::Range;

use crate::core::Source;
use crate::error::Result;

/// A source that generates numbers from a range
pub struct RangeSource {
    range: Range<i64>,
}

impl RangeSource {
    /// Create a new range source
    pub fn new(range: Range<i64>) -> Self {
        Self { range }
    }
}

#[async_trait]
impl Source for RangeSource {
    type Item = i64;

    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
        Ok(self.range.by_ref().take(demand).collect())
    }
}

/// A source that yields items from a vector
pub struct VecSource<T> {
    items: VecDeque<T>,
}

impl<T> VecSource<T> {
    /// Create a new vector source
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }

    /// Add more items to the source
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of remaining items
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
impl<T: Send + 'static> Source for VecSource<T> {
    type Item = T;

    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
        let take = demand.min(self.items.len());
        Ok(self.items.drain(..take).collect())
    }
}

/// A source that pulls from any [`Stream`]
pub struct StreamSource<St> {
    stream: St,
}

impl<St> StreamSource<St> {
    pub fn new(stream: St) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<St> Source for StreamSource<St>
where
    St: Stream + Unpin + Send,
    St::Item: Send + 'static,
{
    type Item = St::Item;

    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
        let mut items = Vec::with_capacity(demand);
        while items.len() < demand {
            match self.stream.next().await {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }
}
