//! Manually Pulled Sources
//!
//! A [`Generator`] produces successive sources on demand. Every pulled value
//! becomes a new generation of the owning node's children.
//!
//! The protocol is an explicit state machine with three operations:
//!
//! - `advance`: pull the next value (`Ok(None)` once exhausted)
//! - `inject_error`: hand a failure back to the generator so it can recover
//!   by producing a replacement value
//! - `cancel`: release any resources held by an unfinished generator
//!
//! A generator is consumed once. [`GeneratorHandle::take`] hands ownership
//! to a single [`GeneratorDriver`]; later takers observe an exhausted source.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use tracing::debug;

use super::Source;
use crate::error::{Error, Result};

/// A source that yields successive replacement sources when pulled.
pub trait Generator: Send {
    /// Pull the next value. `Ok(None)` means the generator is exhausted.
    fn advance(&mut self) -> BoxFuture<'_, Result<Option<Source>>>;

    /// Offer a failure from `advance` back to the generator.
    ///
    /// Returning `Ok(Some(_))` recovers with a replacement value. The default
    /// re-raises the error.
    fn inject_error(&mut self, error: Error) -> BoxFuture<'_, Result<Option<Source>>> {
        future::ready(Err(error)).boxed()
    }

    /// Release resources. Called once when the generator finishes normally,
    /// or when its consumer stops early.
    fn cancel(&mut self) {}
}

/// Shared, take-once ownership of a [`Generator`].
#[derive(Clone)]
pub struct GeneratorHandle {
    slot: Arc<Mutex<Option<Box<dyn Generator>>>>,
}

impl GeneratorHandle {
    /// Wrap a generator.
    pub fn new<G>(generator: G) -> Self
    where
        G: Generator + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Some(Box::new(generator)))),
        }
    }

    /// Take ownership of the generator for driving.
    ///
    /// Returns `None` once a previous consumer has taken it.
    pub fn take(&self) -> Option<GeneratorDriver> {
        self.slot.lock().take().map(|generator| GeneratorDriver {
            generator,
            finished: false,
        })
    }

    /// Whether the generator has not been taken yet.
    pub fn is_fresh(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Whether both handles share the same generator.
    pub fn ptr_eq(&self, other: &GeneratorHandle) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for GeneratorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorHandle")
            .field("fresh", &self.is_fresh())
            .finish()
    }
}

/// Exclusive driver of a taken generator.
///
/// Dropping an unfinished driver cancels the generator.
pub struct GeneratorDriver {
    generator: Box<dyn Generator>,
    finished: bool,
}

impl GeneratorDriver {
    /// Pull the next value, routing failures through `inject_error`.
    ///
    /// When the generator reports exhaustion it is cancelled exactly once.
    /// A failure the generator does not recover from finishes the driver.
    pub async fn next(&mut self) -> Result<Option<Source>> {
        if self.finished {
            return Ok(None);
        }
        let next = match self.generator.advance().await {
            Ok(next) => next,
            Err(error) => {
                debug!(%error, "generator failed, injecting error");
                match self.generator.inject_error(error).await {
                    Ok(next) => next,
                    Err(error) => {
                        self.finished = true;
                        return Err(error);
                    }
                }
            }
        };
        if next.is_none() {
            self.finished = true;
            self.generator.cancel();
        }
        Ok(next)
    }

    /// Whether the generator has finished.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for GeneratorDriver {
    fn drop(&mut self) {
        if !self.finished {
            debug!("cancelling unfinished generator");
            self.generator.cancel();
        }
    }
}

/// Adapts a stream of sources into a [`Generator`].
///
/// Cancelling drops the stream.
pub struct StreamGenerator {
    stream: Option<BoxStream<'static, Result<Source>>>,
}

impl StreamGenerator {
    /// Wrap a stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Source>> + Send + 'static,
    {
        Self {
            stream: Some(stream.boxed()),
        }
    }
}

impl Generator for StreamGenerator {
    fn advance(&mut self) -> BoxFuture<'_, Result<Option<Source>>> {
        async move {
            match self.stream.as_mut() {
                Some(stream) => stream.next().await.transpose(),
                None => Ok(None),
            }
        }
        .boxed()
    }

    fn cancel(&mut self) {
        self.stream = None;
    }
}

/// Adapts a synchronous iterator of sources into a [`Generator`].
pub struct IterGenerator<I> {
    iter: Option<I>,
}

impl<I> IterGenerator<I> {
    /// Wrap an iterator.
    pub fn new(iter: I) -> Self {
        Self { iter: Some(iter) }
    }
}

impl<I> Generator for IterGenerator<I>
where
    I: Iterator<Item = Source> + Send,
{
    fn advance(&mut self) -> BoxFuture<'_, Result<Option<Source>>> {
        future::ready(Ok(self.iter.as_mut().and_then(Iterator::next))).boxed()
    }

    fn cancel(&mut self) {
        self.iter = None;
    }
}
