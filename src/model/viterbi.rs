use super::{FamilySizeDomain, ModelError, TransitionCache, TransitionMatrix};
use crate::tree::{FamilyTree, TreeIndex};

/// Infers ancestral family sizes from the sizes currently set on the tips.
///
/// Both variants overwrite the family size of every internal node and leave
/// the tips untouched.
pub trait Reconstructor {
    fn reconstruct(&self, tree: &mut FamilyTree, cache: &dyn TransitionCache) -> Result<(), ModelError>;
    fn reconstruct_posterior(
        &self,
        tree: &mut FamilyTree,
        cache: &dyn TransitionCache,
    ) -> Result<(), ModelError>;
}

/// Maximum likelihood reconstruction under the birth-death model.
///
/// `reconstruct` finds the jointly most likely assignment of internal sizes
/// (dynamic programming over parent states), `reconstruct_posterior` picks the
/// mode of each node's marginal posterior. The root prior is uniform over the
/// domain's root range.
#[derive(Debug, Default, Clone, Copy)]
pub struct Viterbi;

struct Model<'a> {
    domain: &'a FamilySizeDomain,
    matrices: Vec<Option<&'a TransitionMatrix>>,
}

impl<'a> Model<'a> {
    fn new(tree: &FamilyTree, cache: &'a dyn TransitionCache) -> Result<Self, ModelError> {
        let domain = cache.domain().ok_or(ModelError::CacheNotReady)?;
        let mut matrices = Vec::with_capacity(tree.get_node_count());
        for node in 0..tree.get_node_count() {
            if tree.is_root(node) {
                matrices.push(None);
                continue;
            }
            let length = tree
                .get_length(node)
                .ok_or(ModelError::MissingBranchLength(node))?;
            let matrix = cache
                .transitions(length)
                .ok_or(ModelError::UncachedBranch(length))?;
            matrices.push(Some(matrix));
        }
        for &tip in tree.external_nodes() {
            let size = tree.get_family_size(tip);
            if !domain.contains(size) {
                return Err(ModelError::OutsideDomain {
                    node: tip,
                    size,
                    max: domain.max,
                });
            }
        }
        Ok(Model { domain, matrices })
    }

    fn states(&self) -> usize {
        self.domain.size_count()
    }

    fn offset(&self, size: u32) -> usize {
        (size - self.domain.min) as usize
    }

    fn size(&self, state: usize) -> u32 {
        self.domain.min + state as u32
    }

    fn transition(&self, node: TreeIndex) -> &'a TransitionMatrix {
        self.matrices[node].expect("only the root lacks a branch")
    }

    fn root_states(&self) -> std::ops::RangeInclusive<usize> {
        let low = self.domain.root_min.max(self.domain.min);
        let high = self.domain.root_max.min(self.domain.max);
        self.offset(low)..=self.offset(high)
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite() || **v == f64::INFINITY)
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn normalize(values: &mut [f64]) {
    let max = values.iter().cloned().fold(0.0, f64::max);
    if max > 0.0 {
        for v in values.iter_mut() {
            *v /= max;
        }
    }
}

impl Reconstructor for Viterbi {
    fn reconstruct(&self, tree: &mut FamilyTree, cache: &dyn TransitionCache) -> Result<(), ModelError> {
        let model = Model::new(tree, cache)?;
        let n = model.states();
        let root = tree.get_root();

        // best[node][i]: log likelihood of the subtree below `node` given its
        // parent has state i, choice[node][i] the state of `node` achieving it.
        let mut best: Vec<Vec<f64>> = vec![vec![]; tree.get_node_count()];
        let mut choice: Vec<Vec<usize>> = vec![vec![]; tree.get_node_count()];

        for node in tree.postorder_iter() {
            if node == root {
                continue;
            }
            let matrix = model.transition(node);
            let below: Vec<f64> = if tree.is_external(node) {
                let observed = model.offset(tree.get_family_size(node));
                (0..n)
                    .map(|j| if j == observed { 0.0 } else { f64::NEG_INFINITY })
                    .collect()
            } else {
                let children = tree.get_children(node);
                (0..n)
                    .map(|j| children.iter().map(|&c| best[c][j]).sum())
                    .collect()
            };
            let mut node_best = Vec::with_capacity(n);
            let mut node_choice = Vec::with_capacity(n);
            for row in matrix.iter().take(n) {
                let scores: Vec<f64> = (0..n).map(|j| row[j].ln() + below[j]).collect();
                match argmax(&scores) {
                    Some(j) => {
                        node_best.push(scores[j]);
                        node_choice.push(j);
                    }
                    None => {
                        node_best.push(f64::NEG_INFINITY);
                        node_choice.push(0);
                    }
                }
            }
            best[node] = node_best;
            choice[node] = node_choice;
        }

        let children = tree.get_children(root);
        let mut root_scores = vec![f64::NEG_INFINITY; n];
        for r in model.root_states() {
            root_scores[r] = children.iter().map(|&c| best[c][r]).sum();
        }
        let root_state = argmax(&root_scores).ok_or(ModelError::ZeroLikelihood)?;

        let mut states = vec![0usize; tree.get_node_count()];
        states[root] = root_state;
        tree.set_family_size(root, model.size(root_state));
        for node in tree.preorder_iter() {
            if node == root || tree.is_external(node) {
                continue;
            }
            let parent = tree.get_parent(node).expect("non-root nodes have parents");
            let state = choice[node][states[parent]];
            states[node] = state;
            tree.set_family_size(node, model.size(state));
        }
        trace!("viterbi root size {}", model.size(root_state));
        Ok(())
    }

    fn reconstruct_posterior(
        &self,
        tree: &mut FamilyTree,
        cache: &dyn TransitionCache,
    ) -> Result<(), ModelError> {
        let model = Model::new(tree, cache)?;
        let n = model.states();
        let root = tree.get_root();
        let node_count = tree.get_node_count();

        // inside[node][j] ∝ P(tips below node | node = j)
        // up[node][i]     ∝ P(tips below node | parent = i)
        let mut inside: Vec<Vec<f64>> = vec![vec![]; node_count];
        let mut up: Vec<Vec<f64>> = vec![vec![]; node_count];
        for node in tree.postorder_iter() {
            let mut values = if tree.is_external(node) {
                let observed = model.offset(tree.get_family_size(node));
                (0..n)
                    .map(|j| if j == observed { 1.0 } else { 0.0 })
                    .collect::<Vec<f64>>()
            } else {
                let children = tree.get_children(node);
                (0..n)
                    .map(|j| children.iter().map(|&c| up[c][j]).product())
                    .collect::<Vec<f64>>()
            };
            normalize(&mut values);
            if node != root {
                let matrix = model.transition(node);
                let mut message: Vec<f64> = (0..n)
                    .map(|i| (0..n).map(|k| matrix[i][k] * values[k]).sum())
                    .collect();
                normalize(&mut message);
                up[node] = message;
            }
            inside[node] = values;
        }

        let mut outside: Vec<Vec<f64>> = vec![vec![]; node_count];
        let mut prior = vec![0.0; n];
        for r in model.root_states() {
            prior[r] = 1.0;
        }
        outside[root] = prior;

        for node in tree.preorder_iter() {
            if node == root {
                continue;
            }
            let parent = tree.get_parent(node).expect("non-root nodes have parents");
            let siblings: Vec<TreeIndex> = tree
                .get_children(parent)
                .into_iter()
                .filter(|&s| s != node)
                .collect();
            let from_parent: Vec<f64> = (0..n)
                .map(|i| outside[parent][i] * siblings.iter().map(|&s| up[s][i]).product::<f64>())
                .collect();
            let matrix = model.transition(node);
            let mut values: Vec<f64> = (0..n)
                .map(|j| (0..n).map(|i| from_parent[i] * matrix[i][j]).sum())
                .collect();
            normalize(&mut values);
            outside[node] = values;
        }

        for node in 0..node_count {
            if tree.is_external(node) {
                continue;
            }
            let posterior: Vec<f64> = (0..n).map(|j| inside[node][j] * outside[node][j]).collect();
            if posterior.iter().all(|&p| p <= 0.0) {
                return Err(ModelError::ZeroLikelihood);
            }
            let state = argmax(&posterior).ok_or(ModelError::ZeroLikelihood)?;
            tree.set_family_size(node, model.size(state));
        }
        Ok(())
    }
}
