//! Contexts
//!
//! A [`Context`] is the pluggable policy object consulted by construction,
//! children resolution and hydration. Every hook is optional: a hook that
//! returns `None` reports the capability as absent and the engine falls
//! through to its default behaviour.
//!
//! # Hooks
//!
//! | Hook | Consulted by | Default when absent |
//! |------|--------------|---------------------|
//! | `create_node` | [`Factory::create_node`] | classify and construct |
//! | `children` | [`Factory::children`] | resolve and merge sources |
//! | `hydrate` | [`hydrate`] | nothing to do |
//! | `catch` | [`hydrate`] on hook failure | the failure propagates |
//! | `reference` | reference minting | explicit reference or a fresh symbol |
//! | `close` | [`close`] | nothing to release |
//!
//! [`Factory::create_node`]: crate::Factory::create_node
//! [`Factory::children`]: crate::Factory::children
//! [`hydrate`]: crate::hydrate::hydrate

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::{Error, Result};
use crate::hydrate::Tree;
use crate::node::{Options, SnapshotStream, SourceReference, VNode};
use crate::source::Source;

/// Shared handle to a context.
pub type ContextRef = Arc<dyn Context>;

/// Optional hooks overriding default engine behaviour.
pub trait Context: Send + Sync + 'static {
    /// Replace node construction for `source`.
    fn create_node(&self, _source: &Source, _options: &Options) -> Option<VNode> {
        None
    }

    /// Replace children resolution for the raw source list.
    fn children(&self, _sources: &[Source]) -> Option<SnapshotStream> {
        None
    }

    /// Hydrate `node`. The context is responsible for recursing into the
    /// node's children, typically through [`hydrate_children`].
    ///
    /// [`hydrate_children`]: crate::hydrate::hydrate_children
    fn hydrate(self: Arc<Self>, _node: VNode, _tree: Option<Arc<Tree>>) -> Option<BoxFuture<'static, Result<()>>> {
        None
    }

    /// Handle a failure from [`Context::hydrate`]. Resolving to `Ok` recovers.
    fn catch(&self, _error: &Error, _node: &VNode, _tree: Option<&Tree>) -> Option<BoxFuture<'static, Result<()>>> {
        None
    }

    /// Map a raw reference (from options or marshalled input) to the
    /// reference the node should carry. Must be synchronous.
    fn reference(&self, _raw: Option<&SourceReference>) -> Option<SourceReference> {
        None
    }

    /// Release resources held by the context.
    fn close(&self) -> Option<BoxFuture<'static, Result<()>>> {
        None
    }
}

/// Close a context, if it has anything to release.
pub async fn close(context: &ContextRef) -> Result<()> {
    match context.close() {
        Some(pending) => pending.await,
        None => Ok(()),
    }
}
