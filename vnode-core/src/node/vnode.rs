//! Virtual Nodes
//!
//! A [`VNode`] is an immutable handle: cloning it shares the same node.
//! Children are exposed as a replayable stream of snapshots, where every
//! snapshot is the complete, updated list of child nodes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};

use super::{Options, SourceReference, FRAGMENT, TOKEN};
use crate::error::Result;
use crate::source::Source;

/// One immutable state of a node's full children list.
pub type Snapshot = Arc<[VNode]>;

/// An asynchronous sequence of children snapshots.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot>>;

/// A replayable children sequence.
///
/// Each call to [`Children::stream`] starts a fresh logical run. Nothing is
/// driven until the returned stream is polled.
#[derive(Clone)]
pub struct Children {
    factory: Arc<dyn Fn() -> SnapshotStream + Send + Sync>,
}

impl Children {
    /// Wrap a stream factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> SnapshotStream + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Children that replay a fixed list of snapshots.
    pub fn from_snapshots(snapshots: Vec<Snapshot>) -> Self {
        Self::new(move || stream::iter(snapshots.clone().into_iter().map(Ok)).boxed())
    }

    /// Start a fresh run of the sequence.
    pub fn stream(&self) -> SnapshotStream {
        (self.factory)()
    }

    /// Whether both handles share the same factory.
    pub fn ptr_eq(&self, other: &Children) -> bool {
        Arc::ptr_eq(&self.factory, &other.factory)
    }
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Children(..)")
    }
}

struct NodeInner {
    reference: SourceReference,
    source: Source,
    options: Options,
    children: Option<Children>,
    scalar: bool,
    native: bool,
    hydrated: AtomicBool,
}

/// A node in the virtual tree.
#[derive(Clone)]
pub struct VNode {
    inner: Arc<NodeInner>,
}

impl VNode {
    /// Start building a node with the given identity and source.
    pub fn builder(reference: SourceReference, source: Source) -> NodeBuilder {
        NodeBuilder {
            reference,
            source,
            options: Options::default(),
            children: None,
            scalar: false,
            native: false,
        }
    }

    /// An empty fragment: no identity, no children.
    pub fn empty(source: Source) -> Self {
        Self::builder(FRAGMENT, source).build()
    }

    /// The node identity. Never changes after construction.
    pub fn reference(&self) -> &SourceReference {
        &self.inner.reference
    }

    /// The value the node was produced from.
    pub fn source(&self) -> &Source {
        &self.inner.source
    }

    /// The node options.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// The children sequence, absent for leaves.
    pub fn children(&self) -> Option<&Children> {
        self.inner.children.as_ref()
    }

    /// Whether the source is a terminal value.
    pub fn is_scalar(&self) -> bool {
        self.inner.scalar
    }

    /// Cooperative marker set by contexts that build target-native nodes.
    pub fn is_native(&self) -> bool {
        self.inner.native
    }

    /// Cooperative marker set once a context has hydrated this node.
    pub fn is_hydrated(&self) -> bool {
        self.inner.hydrated.load(Ordering::Acquire)
    }

    /// Mark the node hydrated. Returns `false` if it already was.
    pub fn mark_hydrated(&self) -> bool {
        !self.inner.hydrated.swap(true, Ordering::AcqRel)
    }

    /// Whether this node is a fragment (only its children matter).
    pub fn is_fragment(&self) -> bool {
        self.inner.reference.is_fragment()
    }

    /// Whether this node is a token.
    pub fn is_token(&self) -> bool {
        self.inner.reference == TOKEN && self.inner.scalar
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A copy of this node with `options` shallow-merged over its own.
    pub fn with_options(&self, options: &Options) -> VNode {
        self.rebuild(self.inner.options.merge(options), self.inner.children.clone())
    }

    /// A copy of this node with the given children.
    pub fn with_children(&self, children: Children) -> VNode {
        self.rebuild(self.inner.options.clone(), Some(children))
    }

    fn rebuild(&self, options: Options, children: Option<Children>) -> VNode {
        VNode {
            inner: Arc::new(NodeInner {
                reference: self.inner.reference.clone(),
                source: self.inner.source.clone(),
                options,
                children,
                scalar: self.inner.scalar,
                native: self.inner.native,
                hydrated: AtomicBool::new(false),
            }),
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("reference", &self.inner.reference)
            .field("source", &self.inner.source)
            .field("scalar", &self.inner.scalar)
            .field("has_children", &self.inner.children.is_some())
            .finish()
    }
}

/// Builder for [`VNode`].
#[derive(Debug)]
pub struct NodeBuilder {
    reference: SourceReference,
    source: Source,
    options: Options,
    children: Option<Children>,
    scalar: bool,
    native: bool,
}

impl NodeBuilder {
    /// Attach options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Attach a children sequence.
    pub fn children(mut self, children: Children) -> Self {
        self.children = Some(children);
        self
    }

    /// Attach an optional children sequence.
    pub fn maybe_children(mut self, children: Option<Children>) -> Self {
        self.children = children;
        self
    }

    /// Flag the source as terminal.
    pub fn scalar(mut self, scalar: bool) -> Self {
        self.scalar = scalar;
        self
    }

    /// Flag the node as target-native.
    pub fn native(mut self, native: bool) -> Self {
        self.native = native;
        self
    }

    /// Finish the node.
    pub fn build(self) -> VNode {
        VNode {
            inner: Arc::new(NodeInner {
                reference: self.reference,
                source: self.source,
                options: self.options,
                children: self.children,
                scalar: self.scalar,
                native: self.native,
                hydrated: AtomicBool::new(false),
            }),
        }
    }
}
