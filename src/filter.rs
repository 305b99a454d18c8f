//! Removal of gene families that carry no signal at the root.
//!
//! A family is informative when copies are present on both sides of the root.
//! Presence is propagated from every tip with a non-zero count up through its
//! ancestors; the family is kept only if both children of the root end up
//! marked.
use crate::family::{FamilyDataset, FamilyError, FamilyRecord};
use crate::model::FamilySizeDomain;
use crate::tree::{FamilyTree, TreeIndex};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub families_before: usize,
    pub families_after: usize,
    pub max_size_before: u32,
    pub max_size_after: u32,
}

impl FilterOutcome {
    pub fn removed(&self) -> usize {
        self.families_before - self.families_after
    }

    pub fn changed(&self) -> bool {
        self.families_before != self.families_after || self.max_size_before != self.max_size_after
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PresenceFilter;

impl PresenceFilter {
    /// Drops uninformative families from `families`, replaying each one on
    /// `tree`. When the largest family size changes, `domain` is rebuilt for
    /// the new maximum and pushed into the tree.
    ///
    /// The species index of `families` is bound to `tree` first, so every
    /// species must be a tip of the tree.
    pub fn apply(
        &self,
        families: &mut FamilyDataset,
        tree: &mut FamilyTree,
        domain: &mut FamilySizeDomain,
    ) -> Result<FilterOutcome, FamilyError> {
        let families_before = families.len();
        let max_size_before = families.max_size();
        if families.is_empty() {
            return Ok(FilterOutcome {
                families_before,
                families_after: 0,
                max_size_before,
                max_size_after: max_size_before,
            });
        }
        families.bind_species_index(tree)?;

        let mut keep = Vec::with_capacity(families_before);
        let mut max = 0;
        for (i, record) in families.records().iter().enumerate() {
            families.apply_to_tree(i, tree)?;
            let informative = is_informative(tree);
            if informative {
                max = max.max(record.max_count());
            } else {
                trace!("family {} is not present on both sides of the root", record.id);
            }
            keep.push(informative);
        }

        let families_after = keep.iter().filter(|k| **k).count();
        if families_after != families_before {
            info!(
                "The number of families : {} ==> {}",
                families_before, families_after
            );
            let mut retained: Vec<FamilyRecord> = families
                .replace_records(Vec::new())
                .into_iter()
                .zip(keep)
                .filter_map(|(record, kept)| if kept { Some(record) } else { None })
                .collect();
            for record in retained.iter_mut() {
                record.reference_index = None;
            }
            families.replace_records(retained);
            families.check_patterns();
        }

        if families.max_size() != max {
            debug!("largest family size {} ==> {}", families.max_size(), max);
            families.set_max_size(max);
            *domain = FamilySizeDomain::for_max_size(max);
            tree.set_family_size_domain(domain);
        }

        Ok(FilterOutcome {
            families_before,
            families_after,
            max_size_before,
            max_size_after: families.max_size(),
        })
    }
}

/// Propagates presence for the family sizes currently on the tips and reports
/// whether both children of the root were reached. Marks are cleared before
/// returning.
pub fn is_informative(tree: &mut FamilyTree) -> bool {
    let mut pass = tree.scratch();
    mark_presence(&mut pass);
    mark_root(&mut pass)
}

/// Marks every tip with a non-zero family size and its ancestors. Each walk
/// stops at the first ancestor that is already marked.
pub fn mark_presence(tree: &mut FamilyTree) {
    for tip in (0..tree.get_node_count()).step_by(2) {
        if tree.get_family_size(tip) > 0 {
            mark_lineage(tree, tip);
        }
    }
}

fn mark_lineage(tree: &mut FamilyTree, tip: TreeIndex) {
    tree.mark(tip);
    let mut node = tip;
    // a walk longer than the node count means the parent links loop
    for _ in 0..tree.get_node_count() {
        match tree.get_parent(node) {
            Some(parent) if !tree.is_marked(parent) => {
                tree.mark(parent);
                node = parent;
            }
            _ => return,
        }
    }
    warn!("presence walk from node {} did not terminate at the root", tip);
}

/// Sets the root mark to whether both of its children are marked and returns it.
pub fn mark_root(tree: &mut FamilyTree) -> bool {
    let root = tree.get_root();
    let informative = match (tree.get_child(root, 0), tree.get_child(root, 1)) {
        (Some(left), Some(right)) => tree.is_marked(left) && tree.is_marked(right),
        _ => false,
    };
    if informative {
        tree.mark(root);
    } else {
        tree.unmark(root);
    }
    informative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parser::newick_parser::NewickParser;

    fn families(species: &[&str], rows: &[&[u32]]) -> FamilyDataset {
        let mut families = FamilyDataset::new(species.iter().map(|s| s.to_string()).collect());
        for (i, counts) in rows.iter().enumerate() {
            let id = format!("fam{}", i);
            families.add_record(FamilyRecord::new(&id, &id, counts.to_vec()));
        }
        families
    }

    fn ids(families: &FamilyDataset) -> Vec<&str> {
        families.records().iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn two_tip_tree_needs_both_tips() {
        let mut tree = NewickParser::parse_string("(A:1,B:1);").unwrap();
        let mut domain = FamilySizeDomain::default();
        let mut data = families(&["A", "B"], &[&[0, 0], &[1, 1], &[1, 0], &[0, 2]]);
        let outcome = PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        assert_eq!(ids(&data), vec!["fam1"]);
        assert_eq!(outcome.families_before, 4);
        assert_eq!(outcome.families_after, 1);
        assert_eq!(outcome.removed(), 3);
        assert_eq!(data.max_size(), 1);
    }

    #[test]
    fn only_the_root_children_decide() {
        let mut tree = NewickParser::parse_string("((A:1,B:1):1,(C:1,D:1):1);").unwrap();
        let mut domain = FamilySizeDomain::default();
        let mut data = families(
            &["A", "B", "C", "D"],
            &[&[1, 1, 0, 0], &[1, 0, 0, 1], &[0, 0, 3, 0], &[0, 2, 1, 0]],
        );
        PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        assert_eq!(ids(&data), vec!["fam1", "fam3"]);
    }

    #[test]
    fn marks_do_not_leak_between_families() {
        let mut tree = NewickParser::parse_string("((A:1,B:1):1,C:1);").unwrap();
        let mut domain = FamilySizeDomain::default();
        // the first family marks the left clade; the second must not inherit it
        let mut data = families(&["A", "B", "C"], &[&[1, 0, 1], &[0, 0, 1]]);
        PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        assert_eq!(ids(&data), vec!["fam0"]);
        assert!(!tree.has_marks());
    }

    #[test]
    fn propagation_stops_at_marked_ancestors() {
        let mut tree = NewickParser::parse_string("((A:1,B:1):1,C:1);").unwrap();
        tree.set_family_size(0, 1);
        tree.set_family_size(2, 1);
        let mut pass = tree.scratch();
        mark_presence(&mut pass);
        assert!(pass.is_marked(0) && pass.is_marked(1) && pass.is_marked(2));
        assert!(pass.is_marked(3), "walk reaches the root from the first tip");
        assert!(!pass.is_marked(4));
        assert!(!mark_root(&mut pass));
        assert!(!pass.is_marked(3));
    }

    #[test]
    fn filtering_is_idempotent() {
        let mut tree = NewickParser::parse_string("((A:1,B:1):1,C:1);").unwrap();
        let mut domain = FamilySizeDomain::default();
        let mut data = families(&["A", "B", "C"], &[&[1, 0, 2], &[9, 9, 0], &[0, 4, 4]]);
        let first = PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        assert!(first.changed());
        let second = PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        assert!(!second.changed());
        assert_eq!(second.families_after, first.families_after);
        assert_eq!(second.max_size_after, first.max_size_after);
    }

    #[test]
    fn max_size_never_grows() {
        let mut tree = NewickParser::parse_string("((A:1,B:1):1,C:1);").unwrap();
        let mut domain = FamilySizeDomain::for_max_size(9);
        let mut data = families(&["A", "B", "C"], &[&[1, 0, 2], &[9, 9, 0], &[0, 4, 4]]);
        let before = data.max_size();
        let outcome = PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        assert!(data.max_size() <= before);
        assert_eq!(outcome.max_size_after, 4);
        assert_eq!(domain, FamilySizeDomain::for_max_size(4));
        assert_eq!(tree.family_size_domain(), &domain);
    }

    #[test]
    fn references_are_rebuilt_for_the_kept_families() {
        let mut tree = NewickParser::parse_string("(A:1,B:1);").unwrap();
        let mut domain = FamilySizeDomain::default();
        let mut data = families(&["A", "B"], &[&[0, 1], &[2, 2], &[2, 2]]);
        data.check_patterns();
        PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        let refs: Vec<Option<usize>> = data.records().iter().map(|r| r.reference_index).collect();
        assert_eq!(refs, vec![Some(0), Some(0)]);
    }

    #[test]
    fn unchanged_dataset_is_left_alone() {
        let mut tree = NewickParser::parse_string("(A:1,B:1);").unwrap();
        let mut domain = FamilySizeDomain::for_max_size(100);
        let mut data = families(&["A", "B"], &[&[1, 3], &[2, 2]]);
        let outcome = PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        assert!(!outcome.changed());
        assert_eq!(data.len(), 2);
        assert_eq!(domain, FamilySizeDomain::for_max_size(100));
    }

    #[test]
    fn empty_dataset_is_a_no_op() {
        let mut tree = NewickParser::parse_string("(A:1,B:1);").unwrap();
        let mut domain = FamilySizeDomain::for_max_size(7);
        let mut data = families(&["X", "Y"], &[]);
        let outcome = PresenceFilter.apply(&mut data, &mut tree, &mut domain).unwrap();
        assert!(!outcome.changed());
        assert_eq!(domain, FamilySizeDomain::for_max_size(7));
        assert!(data.index().iter().all(Option::is_none));
    }

    #[test]
    fn species_missing_from_the_tree_is_an_error() {
        let mut tree = NewickParser::parse_string("(A:1,B:1);").unwrap();
        let mut domain = FamilySizeDomain::default();
        let mut data = families(&["A", "Z"], &[&[1, 1]]);
        assert!(PresenceFilter.apply(&mut data, &mut tree, &mut domain).is_err());
    }
}
