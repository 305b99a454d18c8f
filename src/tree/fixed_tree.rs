/// Recursive node produced by the newick parser before the tree is laid out
/// into a [`FamilyTree`](super::FamilyTree) arena.
#[derive(Debug, Default)]
pub struct FixedNode {
    pub children: Vec<FixedNode>,
    pub label: Option<String>,
    pub taxon: Option<String>,
    pub length: Option<f64>,
}

impl FixedNode {
    pub(crate) fn new() -> Self {
        FixedNode {
            children: vec![],
            label: None,
            taxon: None,
            length: None,
        }
    }

    pub(crate) fn tip(taxon: String) -> Self {
        FixedNode {
            taxon: Some(taxon),
            ..FixedNode::new()
        }
    }

    pub fn is_external(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in the subtree rooted here, this node included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}
