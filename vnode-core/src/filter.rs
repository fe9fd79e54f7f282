//! Filtered views over a node's descendants.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};

use crate::merge::{children_union, MergeOptions};
use crate::node::{Children, Snapshot, SnapshotStream, VNode};

type Predicate = Arc<dyn Fn(&VNode) -> bool + Send + Sync>;

/// A copy of `node` whose children hold only descendants matching
/// `predicate`.
///
/// A child that does not match is replaced by its own matching descendants,
/// so matches from any depth are lifted into the nearest matching ancestor's
/// children.
pub fn filtered<P>(node: &VNode, predicate: P) -> VNode
where
    P: Fn(&VNode) -> bool + Send + Sync + 'static,
{
    let predicate: Predicate = Arc::new(predicate);
    let source = node.clone();
    node.with_children(Children::new(move || filter_children(&source, Arc::clone(&predicate))))
}

/// The filtered children sequence of `node`. Empty snapshots are skipped.
pub fn filtered_children<P>(node: &VNode, predicate: P) -> SnapshotStream
where
    P: Fn(&VNode) -> bool + Send + Sync + 'static,
{
    filter_children(node, Arc::new(predicate))
}

fn filter_children(node: &VNode, predicate: Predicate) -> SnapshotStream {
    let Some(children) = node.children() else {
        return stream::empty().boxed();
    };
    children
        .stream()
        .map_ok(move |snapshot| filter_snapshot(snapshot, Arc::clone(&predicate)))
        .try_flatten()
        .boxed()
}

fn filter_snapshot(snapshot: Snapshot, predicate: Predicate) -> SnapshotStream {
    if snapshot.is_empty() {
        return stream::empty().boxed();
    }
    if snapshot.iter().all(&*predicate) {
        return stream::iter([Ok(snapshot)]).boxed();
    }
    let lanes = snapshot
        .iter()
        .map(|child| {
            if predicate(child) {
                stream::iter([Ok(Snapshot::from(vec![child.clone()]))]).boxed()
            } else {
                filter_children(child, Arc::clone(&predicate))
            }
        })
        .collect();
    children_union(lanes, MergeOptions::default())
}
