//! Progressive Merge
//!
//! This module combines independently updating lanes into one stream of
//! tuples, each holding the latest known value of every lane.
//!
//! # Algorithm
//!
//! Every poll of the merged stream:
//!
//! 1. Accepts any newly arrived lanes (for dynamic lane sources).
//! 2. Polls every open lane once, starting from a rotating cursor.
//! 3. Stores each produced value in that lane's slot.
//! 4. If any slot changed, emits a copy of all slots.
//!
//! A finished lane keeps its last value in every later emission. The merged
//! stream ends once the lane source and every lane are exhausted.
//!
//! Lanes that are ready in the same poll are folded into one emission under
//! [`ReadyPolicy::Coalesce`], or emitted one at a time under
//! [`ReadyPolicy::EachLane`]. Either way no value is ever lost: a slot is only
//! replaced by a newer value from the same lane.
//!
//! # Cancellation
//!
//! Dropping the merged stream drops every open lane, which cancels whatever
//! the lane was driving. A failing lane ends the merge: all other lanes are
//! dropped before the error is yielded.

mod union;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::{BoxStream, Stream, StreamExt};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

pub use union::{children_union, children_union_stream};

/// One independently progressing input of a merge.
pub type Lane<T> = BoxStream<'static, Result<T>>;

/// How lanes that are ready during the same poll are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadyPolicy {
    /// Fold every ready lane into a single emission.
    #[default]
    Coalesce,
    /// Emit once per ready lane, rotating which lane is polled first.
    EachLane,
}

/// Merge configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Emission policy for simultaneously ready lanes.
    pub policy: ReadyPolicy,
}

impl MergeOptions {
    /// Options with the given policy.
    pub fn with_policy(policy: ReadyPolicy) -> Self {
        Self { policy }
    }
}

/// Stream of latest-value tuples over a set of lanes.
///
/// Created by [`merge`], [`merge_with`] or [`merge_stream`].
pub struct Merge<T> {
    /// Source of lanes that arrive over time, if any.
    incoming: Option<BoxStream<'static, Result<Lane<T>>>>,
    /// Lane streams; `None` once a lane has finished.
    lanes: Vec<Option<Lane<T>>>,
    /// Latest value per lane.
    values: Vec<Option<T>>,
    /// Number of lanes still open.
    open: usize,
    /// Lane polled first on the next poll.
    cursor: usize,
    options: MergeOptions,
    done: bool,
}

/// Merge a fixed set of lanes with default options.
pub fn merge<T>(lanes: Vec<Lane<T>>) -> Merge<T> {
    merge_with(lanes, MergeOptions::default())
}

/// Merge a fixed set of lanes.
pub fn merge_with<T>(lanes: Vec<Lane<T>>, options: MergeOptions) -> Merge<T> {
    let open = lanes.len();
    Merge {
        incoming: None,
        values: lanes.iter().map(|_| None).collect(),
        lanes: lanes.into_iter().map(Some).collect(),
        open,
        cursor: 0,
        options,
        done: false,
    }
}

/// Merge lanes that arrive over time.
///
/// Lanes take tuple positions in arrival order.
pub fn merge_stream<T>(incoming: BoxStream<'static, Result<Lane<T>>>, options: MergeOptions) -> Merge<T> {
    Merge {
        incoming: Some(incoming),
        lanes: Vec::new(),
        values: Vec::new(),
        open: 0,
        cursor: 0,
        options,
        done: false,
    }
}

impl<T> Merge<T> {
    /// Number of lanes seen so far.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Number of lanes that have not finished.
    pub fn open_lanes(&self) -> usize {
        self.open
    }

    /// End the merge, dropping every open lane, and hand back the error.
    fn fail(&mut self, error: Error) -> Result<Vec<Option<T>>> {
        warn!(%error, open = self.open, "merge lane failed, cancelling remaining lanes");
        self.cancel_all();
        self.done = true;
        Err(error)
    }

    fn cancel_all(&mut self) {
        self.incoming = None;
        for lane in &mut self.lanes {
            lane.take();
        }
        self.open = 0;
    }

    fn accept_incoming(&mut self, cx: &mut Context<'_>) -> Option<Error> {
        let incoming = self.incoming.as_mut()?;
        loop {
            match incoming.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(lane))) => {
                    self.lanes.push(Some(lane));
                    self.values.push(None);
                    self.open += 1;
                }
                Poll::Ready(Some(Err(error))) => return Some(error),
                Poll::Ready(None) => {
                    trace!(lanes = self.lanes.len(), "lane source exhausted");
                    self.incoming = None;
                    return None;
                }
                Poll::Pending => return None,
            }
        }
    }
}

impl<T> Stream for Merge<T>
where
    T: Clone,
{
    type Item = Result<Vec<Option<T>>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if let Some(error) = this.accept_incoming(cx) {
            return Poll::Ready(Some(this.fail(error)));
        }

        let count = this.lanes.len();
        let mut advanced: SmallVec<[usize; 8]> = SmallVec::new();
        for offset in 0..count {
            let index = (this.cursor + offset) % count;
            let Some(lane) = this.lanes[index].as_mut() else {
                continue;
            };
            match lane.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(value))) => {
                    this.values[index] = Some(value);
                    advanced.push(index);
                    if this.options.policy == ReadyPolicy::EachLane {
                        this.cursor = (index + 1) % count;
                        break;
                    }
                }
                Poll::Ready(Some(Err(error))) => {
                    this.lanes[index] = None;
                    this.open -= 1;
                    return Poll::Ready(Some(this.fail(error)));
                }
                Poll::Ready(None) => {
                    this.lanes[index] = None;
                    this.open -= 1;
                    trace!(lane = index, open = this.open, "lane finished");
                }
                Poll::Pending => {}
            }
        }

        if !advanced.is_empty() {
            trace!(lanes = ?advanced, "merge emitting");
            return Poll::Ready(Some(Ok(this.values.clone())));
        }

        if this.open == 0 && this.incoming.is_none() {
            this.done = true;
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}

// Slot values are never pinned, only cloned out.
impl<T> Unpin for Merge<T> {}

impl<T> Drop for Merge<T> {
    fn drop(&mut self) {
        if self.open > 0 || self.incoming.is_some() {
            debug!(open = self.open, "merge dropped early, cancelling open lanes");
        }
    }
}
