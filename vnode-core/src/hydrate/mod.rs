//! Hydration
//!
//! Hydration walks a node graph on behalf of a [`Context`]. The walker only
//! invokes the context's `hydrate` hook; recursing further is the context's
//! job, using one of the helpers below:
//!
//! - [`hydrate_children_group`]: hydrate one snapshot, every child
//!   concurrently
//! - [`hydrate_children_once`]: hydrate the first snapshot only
//! - [`hydrate_children`]: follow every snapshot until the children
//!   sequence ends
//!
//! A failing hook is offered to the context's `catch` hook. If that hook is
//! absent or fails too, the failure reaches the caller as
//! [`Error::Hydrate`].
//!
//! [`Context`]: crate::Context

mod store;
mod tree;

use std::sync::Arc;

use futures_util::future::{self, try_join_all, BoxFuture, FutureExt, TryFutureExt};
use futures_util::stream::TryStreamExt;
use tracing::{debug, trace};

use crate::context::ContextRef;
use crate::error::{Error, Result};
use crate::node::{Snapshot, VNode};

pub use store::{FollowMode, HydrateEvent, StoreContext};
pub use tree::Tree;

/// Hydrate `node` under `context`.
///
/// Resolves immediately when the context has no `hydrate` hook.
pub fn hydrate(context: &ContextRef, node: &VNode, tree: Option<Arc<Tree>>) -> BoxFuture<'static, Result<()>> {
    let Some(pending) = Arc::clone(context).hydrate(node.clone(), tree.clone()) else {
        return future::ok(()).boxed();
    };
    let context = Arc::clone(context);
    let node = node.clone();
    async move {
        match pending.await {
            Ok(()) => Ok(()),
            Err(error) => recover(&context, error, &node, tree.as_deref()).await,
        }
    }
    .boxed()
}

async fn recover(context: &ContextRef, error: Error, node: &VNode, tree: Option<&Tree>) -> Result<()> {
    debug!(reference = %node.reference(), %error, "hydrate hook failed");
    let outcome = match context.catch(&error, node, tree) {
        Some(handled) => handled.await,
        None => Err(error),
    };
    outcome.map_err(|error| match error {
        Error::Hydrate { .. } => error,
        other => Error::Hydrate {
            reference: node.reference().clone(),
            source: Box::new(other),
        },
    })
}

/// Hydrate every child in `snapshot` concurrently, each with a tree naming
/// `node` as its parent.
pub fn hydrate_children_group(
    context: &ContextRef,
    node: &VNode,
    snapshot: &Snapshot,
    parent: Option<Arc<Tree>>,
) -> BoxFuture<'static, Result<()>> {
    let tree = Arc::new(Tree::new(node.reference().clone(), snapshot, parent));
    trace!(reference = %node.reference(), children = snapshot.len(), "hydrating children group");
    let pending: Vec<_> = snapshot
        .iter()
        .map(|child| hydrate(context, child, Some(Arc::clone(&tree))))
        .collect();
    try_join_all(pending).map_ok(|_| ()).boxed()
}

/// Hydrate every snapshot of `node`'s children, one group at a time, until the
/// sequence ends. A node without children completes immediately.
pub fn hydrate_children(context: &ContextRef, node: &VNode, tree: Option<Arc<Tree>>) -> BoxFuture<'static, Result<()>> {
    let Some(children) = node.children() else {
        return future::ok(()).boxed();
    };
    let mut snapshots = children.stream();
    let context = Arc::clone(context);
    let node = node.clone();
    async move {
        while let Some(snapshot) = snapshots.try_next().await? {
            hydrate_children_group(&context, &node, &snapshot, tree.clone()).await?;
        }
        Ok(())
    }
    .boxed()
}

/// Hydrate only the first snapshot of `node`'s children.
pub fn hydrate_children_once(context: &ContextRef, node: &VNode, tree: Option<Arc<Tree>>) -> BoxFuture<'static, Result<()>> {
    let Some(children) = node.children() else {
        return future::ok(()).boxed();
    };
    let mut snapshots = children.stream();
    let context = Arc::clone(context);
    let node = node.clone();
    async move {
        match snapshots.try_next().await? {
            Some(snapshot) => hydrate_children_group(&context, &node, &snapshot, tree).await,
            None => Ok(()),
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use crate::context::Context;
    use crate::factory::create_node;
    use crate::node::SourceReference;
    use crate::source::Source;

    struct Bare;

    impl Context for Bare {}

    #[tokio::test]
    async fn missing_hook_resolves_immediately() {
        let context: ContextRef = Arc::new(Bare);
        let node = create_node(
            Source::function(|_, _| Err(Error::message("must not run"))),
            None,
            vec![],
        )
        .unwrap();
        assert!(hydrate(&context, &node, None).await.is_ok());
    }

    /// Records every visited node with its parent reference and follows
    /// children, failing on the configured reference.
    #[derive(Default)]
    struct Recording {
        visited: Mutex<Vec<(SourceReference, Option<SourceReference>)>>,
        fail_on: Option<SourceReference>,
        recover: bool,
        caught: AtomicUsize,
    }

    impl Context for Recording {
        fn hydrate(self: Arc<Self>, node: VNode, tree: Option<Arc<Tree>>) -> Option<BoxFuture<'static, Result<()>>> {
            Some(
                async move {
                    if self.fail_on.as_ref() == Some(node.reference()) {
                        return Err(Error::message("paint failed"));
                    }
                    let parent = tree.as_ref().map(|tree| tree.reference.clone());
                    self.visited.lock().push((node.reference().clone(), parent));
                    let context: ContextRef = self;
                    hydrate_children(&context, &node, tree).await
                }
                .boxed(),
            )
        }

        fn catch(&self, error: &Error, _node: &VNode, _tree: Option<&Tree>) -> Option<BoxFuture<'static, Result<()>>> {
            self.caught.fetch_add(1, Ordering::SeqCst);
            let outcome = if self.recover { Ok(()) } else { Err(error.clone()) };
            Some(future::ready(outcome).boxed())
        }
    }

    fn list() -> VNode {
        create_node(
            "ul",
            Some(crate::node::Options::with_reference("list")),
            vec![
                create_node("li", Some(crate::node::Options::with_reference("first")), vec![]).unwrap().into(),
                create_node("li", Some(crate::node::Options::with_reference("second")), vec![]).unwrap().into(),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn hook_recurses_with_parent_trees() {
        let recording = Arc::new(Recording::default());
        let context: ContextRef = recording.clone();
        hydrate(&context, &list(), None).await.unwrap();

        let mut visited = recording.visited.lock().clone();
        visited.sort_by_key(|(reference, _)| reference.to_string());
        assert_eq!(
            visited,
            vec![
                (SourceReference::from("first"), Some(SourceReference::from("list"))),
                (SourceReference::from("list"), None),
                (SourceReference::from("second"), Some(SourceReference::from("list"))),
            ]
        );
    }

    #[tokio::test]
    async fn unhandled_failure_is_wrapped_once() {
        let recording = Arc::new(Recording {
            fail_on: Some("second".into()),
            ..Recording::default()
        });
        let context: ContextRef = recording.clone();
        let error = hydrate(&context, &list(), None).await.unwrap_err();

        match error {
            Error::Hydrate { reference, source } => {
                assert_eq!(reference, SourceReference::from("second"));
                assert!(source.is_producer());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(recording.caught.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn catch_hook_recovers() {
        let recording = Arc::new(Recording {
            fail_on: Some("second".into()),
            recover: true,
            ..Recording::default()
        });
        let context: ContextRef = recording.clone();
        hydrate(&context, &list(), None).await.unwrap();
        assert_eq!(recording.caught.load(Ordering::SeqCst), 1);
        assert_eq!(recording.visited.lock().len(), 2);
    }

    #[tokio::test]
    async fn once_stops_after_first_snapshot() {
        let recording = Arc::new(Recording::default());
        let context: ContextRef = recording.clone();
        let node = create_node(
            Source::generator(crate::source::IterGenerator::new(
                vec![Source::from("a"), Source::from("b")].into_iter(),
            )),
            None,
            vec![],
        )
        .unwrap();
        hydrate_children_once(&context, &node, None).await.unwrap();
        assert_eq!(recording.visited.lock().len(), 1);
    }

    /// Records nodes as their hook completes, holding back the node
    /// referenced `slow` for a while first.
    #[derive(Default)]
    struct Staggered {
        finished: Mutex<Vec<SourceReference>>,
    }

    impl Context for Staggered {
        fn hydrate(self: Arc<Self>, node: VNode, tree: Option<Arc<Tree>>) -> Option<BoxFuture<'static, Result<()>>> {
            Some(
                async move {
                    if node.reference() == &SourceReference::from("slow") {
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                    self.finished.lock().push(node.reference().clone());
                    let context: ContextRef = self;
                    hydrate_children(&context, &node, tree).await
                }
                .boxed(),
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn siblings_hydrate_concurrently() {
        let staggered = Arc::new(Staggered::default());
        let context: ContextRef = staggered.clone();
        let root = create_node(
            "div",
            Some(crate::node::Options::with_reference("root")),
            vec![
                create_node("p", Some(crate::node::Options::with_reference("slow")), vec![]).unwrap().into(),
                create_node("p", Some(crate::node::Options::with_reference("fast")), vec![]).unwrap().into(),
            ],
        )
        .unwrap();

        let started = tokio::time::Instant::now();
        hydrate(&context, &root, None).await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_millis(100));
        assert_eq!(
            *staggered.finished.lock(),
            vec![
                SourceReference::from("root"),
                SourceReference::from("fast"),
                SourceReference::from("slow")
            ]
        );
    }
}
