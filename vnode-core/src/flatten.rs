//! Reference flattening.

use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::Result;
use crate::hydrate::StoreContext;
use crate::node::{SourceReference, VNode};

/// The references `node` ultimately stands for.
///
/// A non-fragment node stands for its own reference. A fragment stands for
/// whatever its children stand for, in every snapshot, so a reference is
/// repeated once per snapshot it appears in.
pub fn flatten_references(node: &VNode) -> BoxStream<'static, Result<SourceReference>> {
    if !node.is_fragment() {
        return stream::iter([Ok(node.reference().clone())]).boxed();
    }
    let Some(children) = node.children() else {
        return stream::empty().boxed();
    };
    children
        .stream()
        .map_ok(|snapshot| stream::iter(snapshot.iter().map(flatten_references).collect::<Vec<_>>()).flatten())
        .try_flatten()
        .boxed()
}

/// Like [`flatten_references`], looking every reference up in `store`.
/// References the store has not seen yield `None`.
pub fn flatten_stored(store: Arc<StoreContext>, node: &VNode) -> BoxStream<'static, Result<Option<VNode>>> {
    flatten_references(node)
        .map_ok(move |reference| store.get(&reference))
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextRef;
    use crate::factory::{create_fragment, create_node};
    use crate::hydrate::hydrate;
    use crate::node::Options;
    use crate::source::Source;

    fn item(reference: &str) -> Source {
        create_node("li", Some(Options::with_reference(reference)), vec![])
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn fragments_are_transparent() {
        let nested = create_fragment(None, vec![item("b"), item("c")]);
        let root = create_fragment(None, vec![item("a"), nested.into()]);

        let references: Vec<_> = flatten_references(&root).try_collect().await.unwrap();
        assert_eq!(
            references,
            vec![
                SourceReference::from("a"),
                SourceReference::from("b"),
                SourceReference::from("c")
            ]
        );
    }

    #[tokio::test]
    async fn plain_node_is_its_own_reference() {
        let node = create_node("p", Some(Options::with_reference("para")), vec![item("x")]).unwrap();
        let references: Vec<_> = flatten_references(&node).try_collect().await.unwrap();
        assert_eq!(references, vec![SourceReference::from("para")]);
    }

    #[tokio::test]
    async fn stored_lookup_after_hydration() {
        let store = Arc::new(StoreContext::new());
        let context: ContextRef = store.clone();
        let root = create_fragment(None, vec![item("a")]);
        let unseen = create_fragment(None, vec![item("z")]);
        hydrate(&context, &root, None).await.unwrap();

        let found: Vec<_> = flatten_stored(store.clone(), &root).try_collect().await.unwrap();
        assert!(found[0].as_ref().is_some_and(|node| node.reference() == &SourceReference::from("a")));

        let missing: Vec<_> = flatten_stored(store, &unseen).try_collect().await.unwrap();
        assert!(missing[0].is_none());
    }
}
