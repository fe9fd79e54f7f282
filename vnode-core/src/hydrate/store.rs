//! Store Context
//!
//! A ready-made [`Context`] that owns an identity-keyed store of every node
//! it hydrates. The store belongs to one context instance: nothing is shared
//! between contexts, and [`close`](crate::context::close) empties it.
//!
//! Each node is hydrated at most once, using the node's cooperative
//! `hydrated` marker. Fragments pass through to their children without being
//! stored, since they all share the fragment reference.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{hydrate_children, hydrate_children_once, Tree};
use crate::context::{Context, ContextRef};
use crate::error::Result;
use crate::node::{SourceReference, VNode};

/// How far a [`StoreContext`] follows a node's children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FollowMode {
    /// Hydrate every snapshot until the children sequence ends.
    #[default]
    Follow,
    /// Hydrate the first snapshot only.
    Once,
}

/// One node hydrated by a [`StoreContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrateEvent {
    /// The hydrated node's reference.
    pub reference: SourceReference,
    /// The reference of the node it was hydrated under.
    pub parent: Option<SourceReference>,
    /// Number of ancestors.
    pub depth: usize,
}

/// A context owning a reference-keyed node store.
#[derive(Debug, Default)]
pub struct StoreContext {
    nodes: DashMap<SourceReference, VNode>,
    events: Mutex<Vec<HydrateEvent>>,
    mode: FollowMode,
}

impl StoreContext {
    /// A store following every children generation.
    pub fn new() -> Self {
        Self::with_mode(FollowMode::Follow)
    }

    /// A store with the given follow mode.
    pub fn with_mode(mode: FollowMode) -> Self {
        debug!(?mode, "opening store context");
        Self {
            mode,
            ..Self::default()
        }
    }

    /// The stored node for `reference`.
    pub fn get(&self, reference: &SourceReference) -> Option<VNode> {
        self.nodes.get(reference).map(|entry| entry.value().clone())
    }

    /// Whether a node with `reference` has been stored.
    pub fn contains(&self, reference: &SourceReference) -> bool {
        self.nodes.contains_key(reference)
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Hydrated nodes in the order their hooks ran.
    pub fn events(&self) -> Vec<HydrateEvent> {
        self.events.lock().clone()
    }

    fn record(&self, node: &VNode, tree: Option<&Tree>) {
        let event = HydrateEvent {
            reference: node.reference().clone(),
            parent: tree.map(|tree| tree.reference.clone()),
            depth: tree.map_or(0, |tree| tree.depth() + 1),
        };
        trace!(reference = %event.reference, depth = event.depth, "stored node");
        if let Some(previous) = self.nodes.insert(event.reference.clone(), node.clone()) {
            if !previous.ptr_eq(node) {
                debug!(reference = %event.reference, "replaced stored node");
            }
        }
        self.events.lock().push(event);
    }
}

impl Context for StoreContext {
    fn hydrate(self: Arc<Self>, node: VNode, tree: Option<Arc<Tree>>) -> Option<BoxFuture<'static, Result<()>>> {
        Some(
            async move {
                if !node.mark_hydrated() {
                    trace!(reference = %node.reference(), "already hydrated");
                    return Ok(());
                }
                if !node.is_fragment() {
                    self.record(&node, tree.as_deref());
                }
                let mode = self.mode;
                let context: ContextRef = self;
                match mode {
                    FollowMode::Follow => hydrate_children(&context, &node, tree).await,
                    FollowMode::Once => hydrate_children_once(&context, &node, tree).await,
                }
            }
            .boxed(),
        )
    }

    fn close(&self) -> Option<BoxFuture<'static, Result<()>>> {
        debug!(nodes = self.nodes.len(), "closing store context");
        self.nodes.clear();
        self.events.lock().clear();
        Some(future::ok(()).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::context::close;
    use crate::factory::{create_fragment, create_node};
    use crate::hydrate::hydrate;
    use crate::node::Options;
    use crate::source::{IterGenerator, Source};

    fn item(reference: &str) -> Source {
        create_node("li", Some(Options::with_reference(reference)), vec![])
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn stores_every_non_fragment_node() {
        let store = Arc::new(StoreContext::new());
        let context: ContextRef = store.clone();
        let root = create_node(
            "ul",
            Some(Options::with_reference("root")),
            vec![item("a"), create_fragment(None, vec![item("b"), item("c")]).into()],
        )
        .unwrap();

        hydrate(&context, &root, None).await.unwrap();

        assert_eq!(store.len(), 4);
        assert!(store.get(&"b".into()).is_some());
        let depths: Vec<_> = store.events().into_iter().map(|event| (event.reference, event.depth)).collect();
        assert!(depths.contains(&(SourceReference::from("root"), 0)));
        assert!(depths.contains(&(SourceReference::from("c"), 1)));
    }

    #[tokio::test]
    async fn node_is_hydrated_once() {
        let store = Arc::new(StoreContext::new());
        let context: ContextRef = store.clone();
        let shared = create_node("p", Some(Options::with_reference("shared")), vec![]).unwrap();

        hydrate(&context, &shared, None).await.unwrap();
        hydrate(&context, &shared, None).await.unwrap();

        assert!(shared.is_hydrated());
        assert_eq!(store.events().len(), 1);
    }

    #[tokio::test]
    async fn follows_generations_unless_once() {
        let generations = || {
            create_node(
                Source::generator(IterGenerator::new(vec![item("first"), item("second")].into_iter())),
                None,
                vec![],
            )
            .unwrap()
        };

        let follow = Arc::new(StoreContext::new());
        let context: ContextRef = follow.clone();
        hydrate(&context, &generations(), None).await.unwrap();
        assert!(follow.contains(&"first".into()) && follow.contains(&"second".into()));

        let once = Arc::new(StoreContext::with_mode(FollowMode::Once));
        let context: ContextRef = once.clone();
        hydrate(&context, &generations(), None).await.unwrap();
        assert!(once.contains(&"first".into()));
        assert!(!once.contains(&"second".into()));
    }

    #[tokio::test]
    async fn close_clears_the_store() {
        let store = Arc::new(StoreContext::new());
        let context: ContextRef = store.clone();
        assert!(store.is_empty());
        hydrate(&context, &create_node("p", None, vec![]).unwrap(), None).await.unwrap();
        assert!(!store.is_empty());
        assert_eq!(store.len(), 1);

        close(&context).await.unwrap();
        assert!(store.is_empty());
        assert!(store.events().is_empty());
    }
}
