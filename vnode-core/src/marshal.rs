//! Marshalling
//!
//! A marshalled node is a synchronous, serializable picture of a live node:
//! references become numbers (or caller chosen primitives) and the children
//! sequence becomes an array holding every drained snapshot in order.
//!
//! Only the reference and children change representation. A source that is
//! not a marshallable scalar (a symbol, a function, a nested node) is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::TryStreamExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::Result;
use crate::node::{MarshalledReference, SourceReference, Symbol, VNode};
use crate::source::Source;

/// Serializable form of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarshalledNode {
    /// The marshalled reference.
    pub reference: MarshalledReference,
    /// The source, when it is a marshallable scalar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MarshalledReference>,
    /// Options, omitted when empty.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, Value>,
    /// Whether the node is a scalar leaf.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub scalar: bool,
    /// Every children snapshot, in the order it was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Vec<MarshalledChild>>>,
}

/// A marshalled child: a full node, or a bare scalar shorthand for a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarshalledChild {
    /// A child marshalled in full.
    Node(MarshalledNode),
    /// A bare scalar, decoded as a leaf holding that value.
    Scalar(MarshalledReference),
}

type ReferenceFn = dyn Fn(&SourceReference, &SourceReference) -> MarshalledReference + Send + Sync;

/// Marshalling configuration.
#[derive(Clone, Default)]
pub struct MarshalOptions {
    reference: Option<Arc<ReferenceFn>>,
}

impl MarshalOptions {
    /// Options that number references from 1 in visit order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose marshalled references with `f(parent, reference)` instead of
    /// numbering them. The root node's parent is a fresh symbol.
    pub fn with_reference<F>(mut self, f: F) -> Self
    where
        F: Fn(&SourceReference, &SourceReference) -> MarshalledReference + Send + Sync + 'static,
    {
        self.reference = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for MarshalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshalOptions")
            .field("reference", &self.reference.is_some())
            .finish()
    }
}

/// Marshal `node`, numbering references from 1.
pub async fn marshal(node: &VNode) -> Result<MarshalledNode> {
    marshal_with(node, MarshalOptions::default()).await
}

/// Marshal `node` with explicit options.
///
/// Every children sequence is drained to completion, so this never resolves
/// for a node whose children never end.
pub async fn marshal_with(node: &VNode, options: MarshalOptions) -> Result<MarshalledNode> {
    let mut marshaller = Marshaller {
        options,
        counter: 0,
        assigned: HashMap::new(),
    };
    let root = SourceReference::Symbol(Symbol::new("Root"));
    marshaller.visit(node.clone(), root).await
}

struct Marshaller {
    options: MarshalOptions,
    counter: u64,
    /// Assigned numbers per parent, so siblings stay distinct while the same
    /// reference under the same parent keeps its number across snapshots.
    assigned: HashMap<SourceReference, HashMap<SourceReference, MarshalledReference>>,
}

impl Marshaller {
    fn reference(&mut self, parent: &SourceReference, reference: &SourceReference) -> MarshalledReference {
        if let Some(f) = &self.options.reference {
            return f(parent, reference);
        }
        let siblings = self.assigned.entry(parent.clone()).or_default();
        if let Some(existing) = siblings.get(reference) {
            return existing.clone();
        }
        self.counter += 1;
        let next = MarshalledReference::from(self.counter);
        siblings.insert(reference.clone(), next.clone());
        next
    }

    fn visit(&mut self, node: VNode, parent: SourceReference) -> BoxFuture<'_, Result<MarshalledNode>> {
        async move {
            let marshalled = self.reference(&parent, node.reference());
            let own = SourceReference::from(marshalled.clone());
            let children = match node.children() {
                Some(children) => {
                    let mut snapshots = children.stream();
                    let mut generations = Vec::new();
                    while let Some(snapshot) = snapshots.try_next().await? {
                        let mut generation = Vec::with_capacity(snapshot.len());
                        for child in snapshot.iter() {
                            generation.push(MarshalledChild::Node(self.visit(child.clone(), own.clone()).await?));
                        }
                        generations.push(generation);
                    }
                    Some(generations)
                }
                None => None,
            };
            trace!(reference = %node.reference(), ?marshalled, "marshalled node");
            Ok(MarshalledNode {
                reference: marshalled,
                source: match node.source() {
                    Source::Scalar(value) => MarshalledReference::try_from(value).ok(),
                    _ => None,
                },
                options: node.options().values().clone(),
                scalar: node.is_scalar(),
                children,
            })
        }
        .boxed()
    }
}

/// Encode as JSON text.
pub fn to_json(node: &MarshalledNode) -> Result<String> {
    Ok(serde_json::to_string(node)?)
}

/// Decode from JSON text.
pub fn from_json(text: &str) -> Result<MarshalledNode> {
    Ok(serde_json::from_str(text)?)
}

/// Encode as MessagePack, with named fields.
pub fn to_msgpack(node: &MarshalledNode) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(node)?)
}

/// Decode from MessagePack.
pub fn from_msgpack(bytes: &[u8]) -> Result<MarshalledNode> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::create_node;
    use crate::node::Options;
    use serde_json::json;

    fn page() -> VNode {
        create_node(
            "main",
            Some(Options::new().set("id", "page")),
            vec![
                Source::from("title"),
                create_node("p", None, vec![Source::from("body")]).unwrap().into(),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn numbers_references_in_visit_order() {
        let marshalled = marshal(&page()).await.unwrap();
        let value = serde_json::to_value(&marshalled).unwrap();
        assert_eq!(
            value,
            json!({
                "reference": 1,
                "source": "main",
                "options": { "id": "page" },
                "children": [[
                    { "reference": 2, "source": "title", "scalar": true },
                    {
                        "reference": 3,
                        "source": "p",
                        "children": [[{ "reference": 4, "source": "body", "scalar": true }]]
                    }
                ]]
            })
        );
    }

    #[tokio::test]
    async fn caller_chooses_references() {
        let options = MarshalOptions::new().with_reference(|parent, reference| match (parent, reference) {
            (SourceReference::Symbol(_), _) => MarshalledReference::String("root".into()),
            (parent, reference) => MarshalledReference::String(format!("{}/{}", parent.as_str().unwrap_or("?"), reference.as_str().unwrap_or("child"))),
        });
        let node = create_node("ul", None, vec![create_node("li", Some(Options::with_reference("a")), vec![]).unwrap().into()]).unwrap();

        let marshalled = marshal_with(&node, options).await.unwrap();
        assert_eq!(marshalled.reference, MarshalledReference::String("root".into()));
        let children = marshalled.children.unwrap();
        match &children[0][0] {
            MarshalledChild::Node(child) => assert_eq!(child.reference, MarshalledReference::String("root/a".into())),
            other => panic!("unexpected child {other:?}"),
        }
    }

    #[tokio::test]
    async fn wire_formats_decode_to_the_same_node() {
        let marshalled = marshal(&page()).await.unwrap();
        let text = to_json(&marshalled).unwrap();
        assert!(text.starts_with(r#"{"reference":1,"#), "{text}");
        assert_eq!(from_json(&text).unwrap(), marshalled);
        assert_eq!(from_msgpack(&to_msgpack(&marshalled).unwrap()).unwrap(), marshalled);
    }

    #[test]
    fn bare_scalars_decode_as_leaf_children() {
        let marshalled = from_json(r#"{ "reference": 1, "children": [["text", 2]] }"#).unwrap();
        assert_eq!(
            marshalled.children.unwrap()[0],
            vec![
                MarshalledChild::Scalar(MarshalledReference::String("text".into())),
                MarshalledChild::Scalar(MarshalledReference::Integer(2)),
            ]
        );
    }
}
