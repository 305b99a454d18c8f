use crate::tree::{FamilyTree, TreeIndex};

/// Writes the tree in newick with every node labelled `name_size`, where
/// `size` is the family size currently held by the node. Internal nodes have
/// no name, so they read `_size`.
pub fn write_newick(tree: &FamilyTree) -> String {
    let mut s = write_node(tree, tree.get_root());
    s.push(';');
    s
}

fn write_node(tree: &FamilyTree, node_ref: TreeIndex) -> String {
    let mut s = String::new();
    if tree.is_external(node_ref) {
        s.push_str(&quote(tree.get_taxon(node_ref).unwrap_or("")));
    } else {
        s.push('(');
        let children = tree
            .get_children(node_ref)
            .iter()
            .map(|child| write_node(tree, *child))
            .collect::<Vec<String>>()
            .join(",");
        s.push_str(&children);
        s.push(')');
    }
    s.push('_');
    s.push_str(&tree.get_family_size(node_ref).to_string());
    if let Some(length) = tree.get_length(node_ref) {
        s.push(':');
        s.push_str(&length.to_string());
    }
    s
}

fn quote(name: &str) -> String {
    if name.contains(|c: char| c.is_whitespace() || "(),:;[]'".contains(c)) {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}
