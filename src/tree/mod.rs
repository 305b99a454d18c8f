//! Species trees carrying per-node gene family sizes.
pub mod family_tree;
pub mod fixed_tree;

pub use family_tree::{FamilyTree, FamilyTreeNode, ScratchGuard, TreeIndex};
pub use fixed_tree::FixedNode;
