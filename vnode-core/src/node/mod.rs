//! Virtual Node Model
//!
//! This module defines the data shared by every stage of the engine:
//!
//! - [`SourceReference`]: scalar identities (strings, numbers, booleans and
//!   process-unique [`Symbol`]s)
//! - [`Options`]: opaque per-node configuration, merged shallowly
//! - [`VNode`]: the immutable node handle and its replayable [`Children`]
//!
//! # Design Decisions
//!
//! 1. A node never changes once built. Updates arrive as new snapshots on the
//!    children sequence, never as mutations of an existing node.
//!
//! 2. Fragments are ordinary nodes carrying the reserved [`FRAGMENT`]
//!    reference. Consumers treat them as transparent.
//!
//! 3. Children are a factory of streams rather than a single live stream, so
//!    the same node can be handed to several independent consumers.

mod options;
mod reference;
mod vnode;

pub use options::Options;
pub use reference::{MarshalledReference, SourceReference, Symbol, FRAGMENT, TOKEN};
pub use vnode::{Children, NodeBuilder, Snapshot, SnapshotStream, VNode};
