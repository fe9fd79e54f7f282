//! Node Factory
//!
//! The factory turns sources into nodes and resolves children sources into
//! snapshot streams. It carries the two policies that shape both: an optional
//! injected [`Context`] and the [`MergeOptions`] used whenever several child
//! lanes must be combined.
//!
//! # Laziness
//!
//! Construction itself never drives a producer. Functions are invoked,
//! futures awaited and generators pulled only once somebody iterates the
//! resulting node's children. Every children sequence except a generator's
//! replays from the start on each iteration.

mod children;
mod create;

use std::sync::Arc;

use tracing::trace;

use crate::context::{Context, ContextRef};
use crate::error::Result;
use crate::merge::MergeOptions;
use crate::node::{Options, SnapshotStream, SourceReference, Symbol, VNode, TOKEN};
use crate::source::Source;

/// Builds nodes and resolves children under a context and merge policy.
#[derive(Clone, Default)]
pub struct Factory {
    context: Option<ContextRef>,
    merge: MergeOptions,
}

impl Factory {
    /// A factory with default behaviour and no context.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory consulting `context` hooks.
    pub fn with_context(context: ContextRef) -> Self {
        Self {
            context: Some(context),
            merge: MergeOptions::default(),
        }
    }

    /// Replace the merge options used for children lanes.
    pub fn with_merge_options(mut self, merge: MergeOptions) -> Self {
        self.merge = merge;
        self
    }

    /// The injected context, if any.
    pub fn context(&self) -> Option<&ContextRef> {
        self.context.as_ref()
    }

    /// The merge options used for children lanes.
    pub fn merge_options(&self) -> MergeOptions {
        self.merge
    }

    /// Build a node from `source`.
    ///
    /// `children` are the explicitly supplied child sources. They are only
    /// resolved once the node's children are iterated.
    ///
    /// Fails synchronously only when the source cannot be classified.
    pub fn create_node(
        &self,
        source: impl Into<Source>,
        options: Option<Options>,
        children: Vec<Source>,
    ) -> Result<VNode> {
        let source = source.into().normalize()?;

        if let Some(context) = &self.context {
            let hook_options = options.clone().unwrap_or_default();
            if let Some(node) = context.create_node(&source, &hook_options) {
                trace!(reference = %node.reference(), "context constructed node");
                return Ok(node);
            }
        }

        trace!(kind = ?source.kind()?, "constructing node");
        self.construct(source, options, children.into())
    }

    /// Build a fragment holding `children`.
    pub fn create_fragment(&self, options: Option<Options>, children: Vec<Source>) -> VNode {
        self.fragment_node(options, children.into())
    }

    /// Resolve child sources into a stream of snapshots.
    ///
    /// A context `children` hook, when present, replaces resolution entirely.
    pub fn children(&self, sources: Vec<Source>) -> SnapshotStream {
        if let Some(context) = &self.context {
            if let Some(stream) = context.children(&sources) {
                return stream;
            }
        }
        self.resolve(sources)
    }

    /// The reference a new node should carry.
    fn mint_reference(&self, raw: Option<&SourceReference>) -> SourceReference {
        if let Some(reference) = self.context.as_deref().and_then(|context| context.reference(raw)) {
            return reference;
        }
        raw.cloned()
            .unwrap_or_else(|| SourceReference::Symbol(Symbol::new("@vnode")))
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("context", &self.context.is_some())
            .field("merge", &self.merge)
            .finish()
    }
}

/// Build a node with the default factory.
pub fn create_node(source: impl Into<Source>, options: Option<Options>, children: Vec<Source>) -> Result<VNode> {
    Factory::new().create_node(source, options, children)
}

/// Build a node with a factory consulting `context`.
pub fn create_node_with_context(
    context: &Arc<dyn Context>,
    source: impl Into<Source>,
    options: Option<Options>,
    children: Vec<Source>,
) -> Result<VNode> {
    Factory::with_context(Arc::clone(context)).create_node(source, options, children)
}

/// Build a fragment with the default factory.
pub fn create_fragment(options: Option<Options>, children: Vec<Source>) -> VNode {
    Factory::new().create_fragment(options, children)
}

/// Build a token: a childless scalar node carrying the reserved token
/// reference.
pub fn create_token(value: impl Into<SourceReference>) -> VNode {
    VNode::builder(TOKEN, Source::Scalar(value.into()))
        .scalar(true)
        .build()
}
