//! Ancestry descriptors handed to hydrate hooks.

use std::sync::Arc;

use crate::node::{Snapshot, SourceReference};

/// Where a node sits: the parent's reference, the references of the sibling
/// group it was hydrated in, and the parent's own ancestry.
///
/// Trees hold references only, never nodes, so a descriptor kept by a
/// context does not retain the node graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// Reference of the node whose children are being hydrated.
    pub reference: SourceReference,
    /// References of the children in the current snapshot, in order.
    pub children: Arc<[SourceReference]>,
    /// The ancestry of `reference`.
    pub parent: Option<Arc<Tree>>,
}

impl Tree {
    /// Describe the children group `snapshot` of the node `reference`.
    pub fn new(reference: SourceReference, snapshot: &Snapshot, parent: Option<Arc<Tree>>) -> Self {
        Self {
            reference,
            children: snapshot.iter().map(|child| child.reference().clone()).collect(),
            parent,
        }
    }

    /// This tree followed by every ancestor, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Tree> {
        std::iter::successors(Some(self), |tree| tree.parent.as_deref())
    }

    /// Number of ancestors above this tree.
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::VNode;
    use crate::source::Source;

    #[test]
    fn ancestry_is_a_reference_chain() {
        let child = VNode::builder("item".into(), Source::from("li")).build();
        let snapshot = Snapshot::from(vec![child]);
        let root = Arc::new(Tree::new("root".into(), &snapshot, None));
        let nested = Tree::new("item".into(), &Snapshot::from(Vec::new()), Some(root));

        assert_eq!(nested.depth(), 1);
        let chain: Vec<_> = nested.ancestors().map(|tree| tree.reference.clone()).collect();
        assert_eq!(chain, vec![SourceReference::from("item"), SourceReference::from("root")]);
        assert_eq!(&*nested.parent.as_ref().unwrap().children, &[SourceReference::from("item")]);
    }
}
