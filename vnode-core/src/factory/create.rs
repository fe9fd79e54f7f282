//! Per-kind node construction.

use std::sync::{Arc, OnceLock};

use futures_util::future;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, trace};

use super::children::failed;
use super::Factory;
use crate::error::{Error, Result};
use crate::marshal::{MarshalledChild, MarshalledNode};
use crate::node::{Children, Options, Snapshot, SnapshotStream, SourceReference, VNode, FRAGMENT};
use crate::source::{GeneratorHandle, Source, SourceFn, SourceFuture};

impl Factory {
    pub(super) fn construct(
        &self,
        source: Source,
        options: Option<Options>,
        children: Arc<[Source]>,
    ) -> Result<VNode> {
        match source {
            Source::Function(f) => Ok(self.function_node(f, options, children)),
            Source::Future(pending) => Ok(self.future_node(pending, options, children)),
            Source::Node(node) => Ok(self.extend_node(node, options, children)),
            Source::Marshalled(marshalled) => Ok(self.unmarshal(&marshalled)),
            Source::Scalar(value) if value.is_fragment() => Ok(self.fragment_node(options, children)),
            Source::Scalar(value) => Ok(self.scalar_node(value, options, children)),
            Source::Generator(handle) => Ok(self.generator_node(handle, options, children)),
            source @ (Source::Iterable(_) | Source::Stream(_)) => Ok(self.collection_node(source, options, children)),
            source @ (Source::Empty | Source::Itself) => Ok(VNode::empty(source)),
            Source::Data(value) => Err(Error::Classification(format!("unnormalised data {value}"))),
        }
    }

    /// Replayable children resolved from the explicitly supplied sources.
    fn replay_children(&self, sources: Arc<[Source]>) -> Option<Children> {
        if sources.is_empty() {
            return None;
        }
        let factory = self.clone();
        Some(Children::new(move || factory.children(sources.to_vec())))
    }

    pub(super) fn fragment_node(&self, options: Option<Options>, children: Arc<[Source]>) -> VNode {
        VNode::builder(FRAGMENT, Source::Scalar(FRAGMENT))
            .options(options.unwrap_or_default())
            .maybe_children(self.replay_children(children))
            .build()
    }

    /// The fragment handed to function and collection sources as their child.
    fn child_fragment(&self, children: &Arc<[Source]>) -> Option<VNode> {
        (!children.is_empty()).then(|| self.fragment_node(None, Arc::clone(children)))
    }

    fn scalar_node(&self, value: SourceReference, options: Option<Options>, children: Arc<[Source]>) -> VNode {
        let reference = self.mint_reference(options.as_ref().and_then(Options::explicit_reference));
        VNode::builder(reference, Source::Scalar(value))
            .scalar(children.is_empty())
            .options(options.unwrap_or_default())
            .maybe_children(self.replay_children(children))
            .build()
    }

    /// An existing node, with options merged in and children attached when it
    /// has none of its own.
    fn extend_node(&self, node: VNode, options: Option<Options>, children: Arc<[Source]>) -> VNode {
        let mut next = node;
        if let Some(options) = options {
            if !options.is_empty() && *next.options() != options {
                next = next.with_options(&options);
            }
        }
        if next.children().is_none() {
            if let Some(children) = self.replay_children(children) {
                next = next.with_children(children);
            }
        }
        next
    }

    fn future_node(&self, pending: SourceFuture, options: Option<Options>, children: Arc<[Source]>) -> VNode {
        let factory = self.clone();
        let resolved_options = options.clone();
        let awaited = pending.clone();
        let replay = Children::new(move || {
            let factory = factory.clone();
            let options = resolved_options.clone();
            let children = children.to_vec();
            stream::once(awaited.clone())
                .map(move |resolved| -> Result<SnapshotStream> {
                    let node = factory.create_node(resolved?, options.clone(), children.clone())?;
                    Ok(factory.each_source(Source::Node(node)))
                })
                .try_flatten()
                .boxed()
        });
        VNode::builder(FRAGMENT, Source::Future(pending))
            .options(options.unwrap_or_default())
            .children(replay)
            .build()
    }

    /// A function source. The function runs on every iteration of the
    /// children, receiving the node options and the cached child fragment.
    fn function_node(&self, f: SourceFn, options: Option<Options>, children: Arc<[Source]>) -> VNode {
        let factory = self.clone();
        let options = options.unwrap_or_default();
        let call_options = options.clone();
        let callee = f.clone();
        let child: Arc<OnceLock<Option<VNode>>> = Arc::new(OnceLock::new());
        let replay = Children::new(move || {
            let factory = factory.clone();
            let options = call_options.clone();
            let callee = callee.clone();
            let child = Arc::clone(&child);
            let sources = Arc::clone(&children);
            stream::once(async move {
                let child = child.get_or_init(|| factory.child_fragment(&sources));
                let next = callee.call(&options, child.as_ref())?;
                let terminates = match &next {
                    Source::Itself => true,
                    Source::Function(returned) => returned.ptr_eq(&callee),
                    _ => false,
                };
                if terminates {
                    trace!("function source returned itself, terminating");
                    return Ok(None);
                }
                Ok::<_, Error>(Some(factory.each_source(next)))
            })
            .try_filter_map(future::ok)
            .try_flatten()
            .boxed()
        });
        VNode::builder(FRAGMENT, Source::Function(f))
            .options(options)
            .children(replay)
            .build()
    }

    /// A fixed or asynchronous collection: every element becomes a lane.
    fn collection_node(&self, source: Source, options: Option<Options>, children: Arc<[Source]>) -> VNode {
        let factory = self.clone();
        let element_options = options.as_ref().map(Options::without_reference);
        let collection = source.clone();
        let replay = Children::new(move || {
            let child = factory.child_fragment(&children).map(Source::Node);
            factory.elements(collection.clone(), element_options.clone(), child)
        });
        VNode::builder(FRAGMENT, source)
            .options(options.unwrap_or_default())
            .children(replay)
            .build()
    }

    /// A generator: every pulled value is a new generation of children.
    ///
    /// Generations are strictly sequential: the next value is pulled only
    /// after the previous generation's children sequence has finished.
    fn generator_node(&self, handle: GeneratorHandle, options: Option<Options>, children: Arc<[Source]>) -> VNode {
        let factory = self.clone();
        let element_options = options.clone();
        let driven = handle.clone();
        let replay = Children::new(move || factory.generations(&driven, element_options.clone(), &children));
        VNode::builder(FRAGMENT, Source::Generator(handle))
            .options(options.unwrap_or_default())
            .children(replay)
            .build()
    }

    fn generations(&self, handle: &GeneratorHandle, options: Option<Options>, children: &Arc<[Source]>) -> SnapshotStream {
        let Some(driver) = handle.take() else {
            debug!("generator already consumed, no further generations");
            return stream::empty().boxed();
        };
        let factory = self.clone();
        let child = self.child_fragment(children).map(Source::Node);
        stream::unfold(Some(driver), move |driver| {
            let factory = factory.clone();
            let options = options.clone();
            let child = child.clone();
            async move {
                let mut driver = driver?;
                let generation = match driver.next().await {
                    Ok(Some(value)) => factory.generation(value, options, child),
                    Ok(None) => return None,
                    Err(error) => return Some((failed(error), None)),
                };
                trace!("generator produced a new generation");
                Some((generation, Some(driver)))
            }
        })
        .flatten()
        .boxed()
    }

    fn generation(&self, value: Source, options: Option<Options>, child: Option<Source>) -> SnapshotStream {
        let node = match self.create_node(value, options, child.into_iter().collect()) {
            Ok(node) => node,
            Err(error) => return failed(error),
        };
        match node.children() {
            Some(children) if node.is_fragment() => children.stream(),
            None if node.is_fragment() => stream::iter([Ok(Snapshot::from(Vec::new()))]).boxed(),
            _ => stream::iter([Ok(Snapshot::from(vec![node.clone()]))]).boxed(),
        }
    }

    /// Expand a marshalled node into a live node.
    pub(crate) fn unmarshal(&self, marshalled: &MarshalledNode) -> VNode {
        let raw = SourceReference::from(marshalled.reference.clone());
        let reference = self.mint_reference(Some(&raw));
        let source = marshalled
            .source
            .clone()
            .map_or(Source::Empty, |value| Source::Scalar(value.into()));
        let children = marshalled.children.as_ref().map(|generations| {
            let snapshots: Vec<Snapshot> = generations
                .iter()
                .map(|generation| generation.iter().map(|child| self.unmarshal_child(child)).collect())
                .collect();
            Children::from_snapshots(snapshots)
        });
        VNode::builder(reference, source)
            .options(Options::from(marshalled.options.clone()))
            .scalar(marshalled.scalar)
            .maybe_children(children)
            .build()
    }

    fn unmarshal_child(&self, child: &MarshalledChild) -> VNode {
        match child {
            MarshalledChild::Node(node) => self.unmarshal(node),
            MarshalledChild::Scalar(value) => self.scalar_node(value.clone().into(), None, Arc::from(Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::source::IterGenerator;

    async fn drain(node: &VNode) -> Vec<Snapshot> {
        node.children().unwrap().stream().try_collect().await.unwrap()
    }

    fn scalars(snapshot: &Snapshot) -> Vec<SourceReference> {
        snapshot
            .iter()
            .filter_map(|node| node.source().as_scalar().cloned())
            .collect()
    }

    #[test]
    fn explicit_reference_is_reused() {
        let node = Factory::new()
            .create_node("div", Some(Options::with_reference("main")), vec![])
            .unwrap();
        assert_eq!(node.reference(), &SourceReference::from("main"));
        assert!(node.is_scalar());
    }

    #[test]
    fn scalar_with_children_is_not_scalar() {
        let node = Factory::new().create_node("ul", None, vec![Source::from("li")]).unwrap();
        assert!(!node.is_scalar());
        assert!(node.children().is_some());
    }

    #[tokio::test]
    async fn function_runs_lazily_and_per_iteration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let node = Factory::new()
            .create_node(
                Source::function(move |_, _| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(Source::from("content"))
                }),
                None,
                vec![],
            )
            .unwrap();
        assert!(node.is_fragment());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = drain(&node).await;
        assert_eq!(scalars(&first[0]), vec![SourceReference::from("content")]);
        drain(&node).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn function_receives_child_fragment() {
        let node = Factory::new()
            .create_node(
                Source::function(|_, child| Ok(child.cloned().map_or(Source::Empty, Source::Node))),
                None,
                vec![Source::from("a"), Source::from("b")],
            )
            .unwrap();
        let snapshots = drain(&node).await;
        assert_eq!(
            scalars(snapshots.last().unwrap()),
            vec![SourceReference::from("a"), SourceReference::from("b")]
        );
    }

    #[tokio::test]
    async fn self_returning_function_terminates() {
        let node = Factory::new()
            .create_node(Source::function(|_, _| Ok(Source::Itself)), None, vec![])
            .unwrap();
        assert!(drain(&node).await.is_empty());
    }

    #[tokio::test]
    async fn function_failure_reaches_consumer() {
        let node = Factory::new()
            .create_node(Source::function(|_, _| Err(Error::message("render failed"))), None, vec![])
            .unwrap();
        let result: Result<Vec<Snapshot>> = node.children().unwrap().stream().try_collect().await;
        assert!(result.unwrap_err().is_producer());
    }

    #[tokio::test]
    async fn future_resolves_once_across_replays() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counted = polls.clone();
        let node = Factory::new()
            .create_node(
                Source::future(async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(Source::from("later"))
                }),
                None,
                vec![],
            )
            .unwrap();
        assert!(node.is_fragment());
        drain(&node).await;
        let second = drain(&node).await;
        assert_eq!(scalars(&second[0]), vec![SourceReference::from("later")]);
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generator_is_consumed_once() {
        let node = Factory::new()
            .create_node(
                Source::generator(IterGenerator::new(vec![Source::from(1), Source::from(2)].into_iter())),
                None,
                vec![],
            )
            .unwrap();
        assert_eq!(drain(&node).await.len(), 2);
        assert!(drain(&node).await.is_empty());
    }

    #[tokio::test]
    async fn empty_generation_clears_children() {
        let node = Factory::new()
            .create_node(
                Source::generator(IterGenerator::new(vec![Source::from("a"), Source::Empty].into_iter())),
                None,
                vec![],
            )
            .unwrap();
        let snapshots = drain(&node).await;
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[1].is_empty());
    }

    #[tokio::test]
    async fn unmarshal_uses_marshalled_reference() {
        let marshalled: MarshalledNode = serde_json::from_value(serde_json::json!({
            "reference": 1,
            "source": "button",
            "options": { "class": "primary" },
            "children": [["I am a primary button"]]
        }))
        .unwrap();
        let node = Factory::new().create_node(marshalled, None, vec![]).unwrap();
        assert_eq!(node.reference(), &SourceReference::from(1));
        assert_eq!(node.options().get("class"), Some(&"primary".into()));
        let snapshots = drain(&node).await;
        assert_eq!(
            scalars(&snapshots[0]),
            vec![SourceReference::from("I am a primary button")]
        );
    }
}
