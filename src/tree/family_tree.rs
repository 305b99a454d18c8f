use super::fixed_tree::FixedNode;
use crate::io::error::IoError;
use crate::model::FamilySizeDomain;
use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};

pub type TreeIndex = usize;

#[derive(Debug, Clone)]
pub struct FamilyTreeNode {
    pub taxon: Option<String>,
    pub label: Option<String>,
    pub parent: Option<TreeIndex>,
    pub first_child: Option<TreeIndex>,
    pub next_sibling: Option<TreeIndex>,
    pub length: Option<f64>,
    pub family_size: u32,
    marked: bool,
}

impl FamilyTreeNode {
    fn new(taxon: Option<String>, label: Option<String>, parent: Option<TreeIndex>, length: Option<f64>) -> Self {
        FamilyTreeNode {
            taxon,
            label,
            parent,
            first_child: None,
            next_sibling: None,
            length,
            family_size: 0,
            marked: false,
        }
    }
}

/// A strictly binary species tree stored in an arena.
///
/// Nodes are laid out in in-order: for every internal node the left subtree
/// comes first, then the node itself, then the right subtree. With a binary
/// tree this places every leaf at an even index and every internal node at an
/// odd one, so `(0..tree.get_node_count()).step_by(2)` visits exactly the
/// leaves.
///
/// Each node carries a scratch mark used by presence propagation. Marks are
/// never cleared implicitly: whoever sets them must call [`clear_marks`]
/// before the tree is used for the next family, or hold a [`ScratchGuard`]
/// which clears them when dropped.
///
/// [`clear_marks`]: FamilyTree::clear_marks
#[derive(Debug, Clone)]
pub struct FamilyTree {
    nodes: Vec<FamilyTreeNode>,
    external_nodes: Vec<TreeIndex>,
    internal_nodes: Vec<TreeIndex>,
    root: TreeIndex,
    lambda: Option<f64>,
    family_size: FamilySizeDomain,
}

impl FamilyTree {
    pub fn from_fixed_node(root: FixedNode) -> Result<Self, IoError> {
        if root.is_external() {
            return Err(IoError::Format(
                "a species tree needs at least two tips".to_string(),
            ));
        }
        let node_count = root.node_count();
        let mut slots: Vec<Option<FamilyTreeNode>> = vec![None; node_count];
        let root_index = Self::new_helper(&mut slots, root, 0, None)?;

        let nodes = slots
            .into_iter()
            .collect::<Option<Vec<FamilyTreeNode>>>()
            .ok_or_else(|| IoError::Format("tree layout left an empty slot".to_string()))?;

        let mut tree = FamilyTree {
            nodes,
            external_nodes: vec![],
            internal_nodes: vec![],
            root: root_index,
            lambda: None,
            family_size: FamilySizeDomain::default(),
        };

        let mut taxa = HashSet::new();
        for index in 0..tree.nodes.len() {
            if tree.is_external(index) {
                let taxon = tree.nodes[index]
                    .taxon
                    .clone()
                    .ok_or_else(|| IoError::Format("tip without a taxon name".to_string()))?;
                if !taxa.insert(taxon.clone()) {
                    return Err(IoError::DuplicateTaxon(taxon));
                }
                tree.external_nodes.push(index);
            } else {
                tree.internal_nodes.push(index);
            }
        }
        trace!(
            "laid out tree with {} tips and {} internal nodes",
            tree.external_nodes.len(),
            tree.internal_nodes.len()
        );
        Ok(tree)
    }

    // Places `node` and its subtree starting at `start`, returning the slot of `node`.
    fn new_helper(
        slots: &mut Vec<Option<FamilyTreeNode>>,
        node: FixedNode,
        start: usize,
        parent: Option<TreeIndex>,
    ) -> Result<TreeIndex, IoError> {
        let FixedNode {
            children,
            label,
            taxon,
            length,
        } = node;

        match children.len() {
            0 => {
                slots[start] = Some(FamilyTreeNode::new(taxon, label, parent, length));
                Ok(start)
            }
            2 => {
                let mut children = children.into_iter();
                let (left, right) = match (children.next(), children.next()) {
                    (Some(l), Some(r)) => (l, r),
                    _ => unreachable!("length checked above"),
                };
                let index = start + left.node_count();
                let left_index = Self::new_helper(slots, left, start, Some(index))?;
                let right_index = Self::new_helper(slots, right, index + 1, Some(index))?;

                let mut this = FamilyTreeNode::new(taxon, label, parent, length);
                this.first_child = Some(left_index);
                slots[index] = Some(this);
                if let Some(left_node) = slots[left_index].as_mut() {
                    left_node.next_sibling = Some(right_index);
                }
                Ok(index)
            }
            n => Err(IoError::Format(format!(
                "found a node with {} children, species trees must be strictly binary",
                n
            ))),
        }
    }

    pub fn get_root(&self) -> TreeIndex {
        self.root
    }

    pub fn get_node(&self, index: TreeIndex) -> Option<&FamilyTreeNode> {
        self.nodes.get(index)
    }

    pub fn get_node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get_external_node_count(&self) -> usize {
        self.external_nodes.len()
    }

    pub fn external_nodes(&self) -> &[TreeIndex] {
        &self.external_nodes
    }

    pub fn is_external(&self, index: TreeIndex) -> bool {
        self.nodes[index].first_child.is_none()
    }

    pub fn is_root(&self, index: TreeIndex) -> bool {
        index == self.root
    }

    pub fn get_parent(&self, index: TreeIndex) -> Option<TreeIndex> {
        self.nodes[index].parent
    }

    pub fn get_children(&self, index: TreeIndex) -> Vec<TreeIndex> {
        let mut children = Vec::new();
        let mut next = self.nodes[index].first_child;
        while let Some(child) = next {
            children.push(child);
            next = self.nodes[child].next_sibling;
        }
        children
    }

    pub fn get_child(&self, index: TreeIndex, i: usize) -> Option<TreeIndex> {
        self.get_children(index).get(i).copied()
    }

    pub fn get_taxon(&self, index: TreeIndex) -> Option<&str> {
        self.nodes[index].taxon.as_deref()
    }

    pub fn get_label(&self, index: TreeIndex) -> Option<&str> {
        self.nodes[index].label.as_deref()
    }

    pub fn get_length(&self, index: TreeIndex) -> Option<f64> {
        self.nodes[index].length
    }

    /// Finds the tip for `taxon`, preferring an exact match over a
    /// case-insensitive one.
    pub fn get_taxon_node(&self, taxon: &str) -> Option<TreeIndex> {
        self.external_nodes
            .iter()
            .copied()
            .find(|&i| self.get_taxon(i) == Some(taxon))
            .or_else(|| {
                self.external_nodes.iter().copied().find(|&i| {
                    self.get_taxon(i)
                        .map(|t| t.eq_ignore_ascii_case(taxon))
                        .unwrap_or(false)
                })
            })
    }

    pub fn get_family_size(&self, index: TreeIndex) -> u32 {
        self.nodes[index].family_size
    }

    pub fn set_family_size(&mut self, index: TreeIndex, size: u32) {
        self.nodes[index].family_size = size;
    }

    /// Sets the family size of the tip named `taxon`. Returns false when no
    /// such tip exists.
    pub fn set_family_size_by_species(&mut self, taxon: &str, size: u32) -> bool {
        match self.get_taxon_node(taxon) {
            Some(index) => {
                self.set_family_size(index, size);
                true
            }
            None => false,
        }
    }

    pub fn is_marked(&self, index: TreeIndex) -> bool {
        self.nodes[index].marked
    }

    pub fn mark(&mut self, index: TreeIndex) {
        self.nodes[index].marked = true;
    }

    pub fn unmark(&mut self, index: TreeIndex) {
        self.nodes[index].marked = false;
    }

    pub fn clear_marks(&mut self) {
        for node in self.nodes.iter_mut() {
            node.marked = false;
        }
    }

    pub fn has_marks(&self) -> bool {
        self.nodes.iter().any(|n| n.marked)
    }

    /// Borrows the tree for a pass that writes scratch marks. The marks are
    /// cleared when the guard goes out of scope, on every exit path.
    pub fn scratch(&mut self) -> ScratchGuard<'_> {
        ScratchGuard { tree: self }
    }

    pub fn preorder_iter(&self) -> Vec<TreeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            order.push(index);
            let mut children = self.get_children(index);
            children.reverse();
            stack.extend(children);
        }
        order
    }

    pub fn postorder_iter(&self) -> Vec<TreeIndex> {
        let mut order = self.preorder_iter();
        order.reverse();
        order
    }

    pub fn get_lambda(&self) -> Option<f64> {
        self.lambda
    }

    pub fn set_lambda(&mut self, lambda: f64) {
        self.lambda = Some(lambda);
    }

    pub fn family_size_domain(&self) -> &FamilySizeDomain {
        &self.family_size
    }

    pub fn set_family_size_domain(&mut self, domain: &FamilySizeDomain) {
        debug!("tree family size domain set to {}", domain);
        self.family_size = domain.clone();
    }
}

impl fmt::Display for FamilyTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", crate::io::writer::newick_writer::write_newick(self))
    }
}

pub struct ScratchGuard<'a> {
    tree: &'a mut FamilyTree,
}

impl Deref for ScratchGuard<'_> {
    type Target = FamilyTree;

    fn deref(&self) -> &FamilyTree {
        self.tree
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut FamilyTree {
        self.tree
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        self.tree.clear_marks();
    }
}

#[cfg(test)]
mod tests {
    use crate::io::parser::newick_parser::NewickParser;

    #[test]
    fn leaves_sit_at_even_slots() {
        let tree = NewickParser::parse_string("((a:1,b:1):2,(c:1,(d:1,e:1):1):2);").unwrap();
        assert_eq!(tree.get_node_count(), 9);
        for i in 0..tree.get_node_count() {
            assert_eq!(tree.is_external(i), i % 2 == 0, "slot {}", i);
        }
        let taxa: Vec<&str> = (0..tree.get_node_count())
            .step_by(2)
            .map(|i| tree.get_taxon(i).unwrap())
            .collect();
        assert_eq!(taxa, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(tree.get_root(), 3);
    }

    #[test]
    fn parents_and_children_agree() {
        let tree = NewickParser::parse_string("((a:1,b:1):2,c:3);").unwrap();
        let root = tree.get_root();
        assert_eq!(tree.get_parent(root), None);
        for child in tree.get_children(root) {
            assert_eq!(tree.get_parent(child), Some(root));
        }
        assert_eq!(tree.get_children(root).len(), 2);
        assert_eq!(tree.get_child(root, 1), tree.get_taxon_node("c"));
    }

    #[test]
    fn taxon_lookup_falls_back_to_case_insensitive() {
        let mut tree = NewickParser::parse_string("(Human:1,Chimp:1);").unwrap();
        assert_eq!(tree.get_taxon_node("Human"), Some(0));
        assert_eq!(tree.get_taxon_node("chimp"), Some(2));
        assert!(tree.set_family_size_by_species("HUMAN", 4));
        assert_eq!(tree.get_family_size(0), 4);
        assert!(!tree.set_family_size_by_species("mouse", 4));
    }

    #[test]
    fn scratch_guard_clears_marks() {
        let mut tree = NewickParser::parse_string("((a:1,b:1):2,c:3);").unwrap();
        {
            let mut pass = tree.scratch();
            pass.mark(0);
            pass.mark(1);
            assert!(pass.has_marks());
        }
        assert!(!tree.has_marks());
    }

    #[test]
    fn rejects_non_binary_trees() {
        assert!(NewickParser::parse_string("(a:1,b:1,c:1);").is_err());
    }

    #[test]
    fn rejects_duplicate_taxa() {
        assert!(NewickParser::parse_string("(a:1,(a:1,b:1):1);").is_err());
    }

    #[test]
    fn postorder_visits_children_first() {
        let tree = NewickParser::parse_string("((a:1,b:1):2,c:3);").unwrap();
        let order = tree.postorder_iter();
        assert_eq!(order.len(), 5);
        assert_eq!(*order.last().unwrap(), tree.get_root());
        for (position, &node) in order.iter().enumerate() {
            for child in tree.get_children(node) {
                assert!(order.iter().position(|&n| n == child).unwrap() < position);
            }
        }
    }
}
