//! Children union: merge per-source snapshot lanes into combined snapshots.

use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};

use super::{merge_stream, merge_with, Merge, MergeOptions};
use crate::error::Result;
use crate::node::{Snapshot, SnapshotStream};

/// Merge snapshot lanes, concatenating the latest snapshot of every lane in
/// lane order. Lanes that have not produced yet contribute nothing.
pub fn children_union(lanes: Vec<SnapshotStream>, options: MergeOptions) -> SnapshotStream {
    concat_parts(merge_with(lanes, options))
}

/// Like [`children_union`], for lanes that arrive over time.
pub fn children_union_stream(
    incoming: BoxStream<'static, Result<SnapshotStream>>,
    options: MergeOptions,
) -> SnapshotStream {
    concat_parts(merge_stream(incoming, options))
}

fn concat_parts(merged: Merge<Snapshot>) -> SnapshotStream {
    merged
        .map_ok(|parts| {
            parts
                .iter()
                .flatten()
                .flat_map(|part| part.iter().cloned())
                .collect::<Snapshot>()
        })
        .boxed()
}
