//! Children resolution.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::trace;

use super::Factory;
use crate::error::Error;
use crate::merge::{children_union, children_union_stream};
use crate::node::{Options, Snapshot, SnapshotStream};
use crate::source::Source;

/// A sequence that fails immediately with `error`.
pub(super) fn failed(error: Error) -> SnapshotStream {
    stream::iter([Err(error)]).boxed()
}

/// A sequence holding one empty snapshot.
fn cleared() -> SnapshotStream {
    stream::iter([Ok(Snapshot::from(Vec::new()))]).boxed()
}

impl Factory {
    /// A single source resolves on its own. Several sources are resolved
    /// independently and merged into one lane each.
    pub(super) fn resolve(&self, mut sources: Vec<Source>) -> SnapshotStream {
        match sources.len() {
            0 => cleared(),
            1 => self.each_source(sources.swap_remove(0)),
            count => {
                trace!(lanes = count, "merging child sources");
                let lanes = sources.into_iter().map(|source| self.each_source(source)).collect();
                children_union(lanes, self.merge)
            }
        }
    }

    /// The snapshots one child source contributes to its parent.
    pub(super) fn each_source(&self, source: Source) -> SnapshotStream {
        match source {
            Source::Empty | Source::Itself => stream::empty().boxed(),
            Source::Future(pending) => {
                let factory = self.clone();
                stream::once(pending)
                    .map_ok(move |resolved| factory.each_source(resolved))
                    .try_flatten()
                    .boxed()
            }
            Source::Node(node) if node.is_fragment() => match node.children() {
                Some(children) => children.stream(),
                None => stream::empty().boxed(),
            },
            Source::Node(node) => stream::iter([Ok(Snapshot::from(vec![node]))]).boxed(),
            Source::Data(value) => match Source::Data(value).normalize() {
                Ok(source) => self.each_source(source),
                Err(error) => failed(error),
            },
            collection @ (Source::Iterable(_) | Source::Stream(_)) => self.elements(collection, None, None),
            other => match self.create_node(other, None, Vec::new()) {
                Ok(node) => self.each_source(Source::Node(node)),
                Err(error) => failed(error),
            },
        }
    }

    /// Every element of a collection becomes one merged lane. Elements are
    /// constructed with `options` and the shared `child` source.
    pub(super) fn elements(&self, collection: Source, options: Option<Options>, child: Option<Source>) -> SnapshotStream {
        let element = {
            let factory = self.clone();
            move |item: Source| match factory.create_node(item, options.clone(), child.clone().into_iter().collect()) {
                Ok(node) => factory.each_source(Source::Node(node)),
                Err(error) => failed(error),
            }
        };
        match collection {
            Source::Iterable(items) if items.is_empty() => cleared(),
            Source::Iterable(items) => {
                let lanes = items.iter().cloned().map(element).collect();
                children_union(lanes, self.merge)
            }
            Source::Stream(items) => children_union_stream(items.stream().map_ok(element).boxed(), self.merge),
            other => self.each_source(other),
        }
    }
}
