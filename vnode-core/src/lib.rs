//! VNode Core
//!
//! This crate turns heterogeneous sources into virtual nodes whose children
//! update over time. It implements:
//!
//! - Source classification and lazy node construction
//! - Children resolution into streams of immutable snapshots
//! - A progressive merge of independently updating lanes
//! - Context driven hydration with per-context node stores
//! - Marshalling to and from JSON and MessagePack
//!
//! The crate is runtime agnostic: everything asynchronous is a
//! `futures-util` stream or future and runs on whatever executor polls it.
//!
//! # Architecture
//!
//! - `node`: references, options and the immutable [`VNode`] handle
//! - `source`: the [`Source`] kinds and manually pulled generators
//! - `factory`: node construction and children resolution
//! - `merge`: the progressive merge and the children union built on it
//! - `context`: the optional hooks a [`Context`] can override
//! - `hydrate`: the hydration walker and [`StoreContext`]
//! - `marshal`, `filter`, `flatten`: views over constructed nodes
//!
//! # Example
//!
//! ```rust,ignore
//! use futures_util::TryStreamExt;
//! use vnode_core::{create_node, Source};
//!
//! let list = create_node(Source::iter(["A", "B", "C"]), None, vec![])?;
//! let snapshots: Vec<_> = list.children().unwrap().stream().try_collect().await?;
//! // One snapshot holding the three scalar nodes, in order.
//! assert_eq!(snapshots.len(), 1);
//! ```

pub mod context;
pub mod error;
pub mod factory;
pub mod filter;
pub mod flatten;
pub mod hydrate;
pub mod marshal;
pub mod merge;
pub mod node;
pub mod source;

pub use context::{close, Context, ContextRef};
pub use error::{Error, Result};
pub use factory::{create_fragment, create_node, create_node_with_context, create_token, Factory};
pub use filter::{filtered, filtered_children};
pub use flatten::{flatten_references, flatten_stored};
pub use hydrate::{hydrate, hydrate_children, hydrate_children_group, hydrate_children_once, FollowMode, StoreContext, Tree};
pub use marshal::{marshal, marshal_with, MarshalOptions, MarshalledChild, MarshalledNode};
pub use merge::{merge, merge_stream, merge_with, Lane, Merge, MergeOptions, ReadyPolicy};
pub use node::{Children, MarshalledReference, Options, Snapshot, SnapshotStream, SourceReference, Symbol, VNode, FRAGMENT, TOKEN};
pub use source::{Generator, IterGenerator, Source, SourceKind, StreamGenerator};
