use super::{FamilySizeDomain, ModelError};
use crate::tree::FamilyTree;
use std::collections::HashMap;
use std::ops::Deref;

/// Largest domain a [`BirthDeathCache`] will fill; each branch length holds a
/// square matrix over the domain.
pub const MAX_DOMAIN_SIZES: usize = 10_000;

/// `matrix[parent][child]`, both offset by the domain minimum.
pub type TransitionMatrix = Vec<Vec<f64>>;

/// Per-branch transition probabilities shared by every family reconstructed
/// on one tree.
///
/// A cache is filled by [`reset`](TransitionCache::reset) for a given tree and
/// family-size domain and must be emptied by
/// [`release`](TransitionCache::release) when the run is over. Use
/// [`CacheLease`] to keep the two paired.
pub trait TransitionCache {
    fn reset(&mut self, tree: &FamilyTree, domain: &FamilySizeDomain) -> Result<(), ModelError>;
    fn release(&mut self);
    fn transitions(&self, branch_length: f64) -> Option<&TransitionMatrix>;
    fn domain(&self) -> Option<&FamilySizeDomain>;
}

/// Transition probabilities of a linear birth-death process with equal birth
/// and death rates, keyed by branch length.
#[derive(Debug, Default)]
pub struct BirthDeathCache {
    lambda: Option<f64>,
    domain: Option<FamilySizeDomain>,
    matrices: HashMap<u64, TransitionMatrix>,
}

impl BirthDeathCache {
    pub fn new() -> Self {
        BirthDeathCache::default()
    }

    pub fn is_ready(&self) -> bool {
        self.domain.is_some()
    }

    pub fn cached_branch_count(&self) -> usize {
        self.matrices.len()
    }
}

impl TransitionCache for BirthDeathCache {
    fn reset(&mut self, tree: &FamilyTree, domain: &FamilySizeDomain) -> Result<(), ModelError> {
        let lambda = tree.get_lambda().ok_or(ModelError::MissingLambda)?;
        if domain.size_count() > MAX_DOMAIN_SIZES {
            return Err(ModelError::DomainTooLarge(domain.clone()));
        }
        if self.lambda != Some(lambda) || self.domain.as_ref() != Some(domain) {
            self.matrices.clear();
        }
        let log_factorials = log_factorials(2 * domain.max as usize + 1);
        for node in 0..tree.get_node_count() {
            if tree.is_root(node) {
                continue;
            }
            let length = tree
                .get_length(node)
                .ok_or(ModelError::MissingBranchLength(node))?;
            self.matrices
                .entry(length.to_bits())
                .or_insert_with(|| transition_matrix(lambda, length, domain, &log_factorials));
        }
        debug!(
            "birth-death cache holds {} branch lengths for lambda {} over {}",
            self.matrices.len(),
            lambda,
            domain
        );
        self.lambda = Some(lambda);
        self.domain = Some(domain.clone());
        Ok(())
    }

    fn release(&mut self) {
        trace!("releasing {} cached transition matrices", self.matrices.len());
        self.matrices.clear();
        self.lambda = None;
        self.domain = None;
    }

    fn transitions(&self, branch_length: f64) -> Option<&TransitionMatrix> {
        self.matrices.get(&branch_length.to_bits())
    }

    fn domain(&self) -> Option<&FamilySizeDomain> {
        self.domain.as_ref()
    }
}

/// Holds a cache filled for one run; the cache is released when the lease is
/// dropped.
pub struct CacheLease<'a, C: TransitionCache + ?Sized> {
    cache: &'a mut C,
}

impl<'a, C: TransitionCache + ?Sized> CacheLease<'a, C> {
    pub fn acquire(
        cache: &'a mut C,
        tree: &FamilyTree,
        domain: &FamilySizeDomain,
    ) -> Result<Self, ModelError> {
        if let Err(e) = cache.reset(tree, domain) {
            cache.release();
            return Err(e);
        }
        Ok(CacheLease { cache })
    }
}

impl<C: TransitionCache + ?Sized> Deref for CacheLease<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.cache
    }
}

impl<C: TransitionCache + ?Sized> Drop for CacheLease<'_, C> {
    fn drop(&mut self) {
        self.cache.release();
    }
}

fn log_factorials(n: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(n + 1);
    table.push(0.0);
    for i in 1..=n {
        table.push(table[i - 1] + (i as f64).ln());
    }
    table
}

fn ln_choose(n: usize, k: usize, log_factorials: &[f64]) -> f64 {
    log_factorials[n] - log_factorials[k] - log_factorials[n - k]
}

/// P(child size `c` | parent size `s`) after time `t` with birth = death = `lambda`.
pub fn birth_death_probability(s: u32, c: u32, lambda: f64, t: f64, log_factorials: &[f64]) -> f64 {
    if s == 0 {
        return if c == 0 { 1.0 } else { 0.0 };
    }
    let alpha = lambda * t / (1.0 + lambda * t);
    let coeff = 1.0 - 2.0 * alpha;
    let (s, c) = (s as usize, c as usize);
    let sum: f64 = (0..=s.min(c))
        .map(|j| {
            let ln_coefficient =
                ln_choose(s, j, log_factorials) + ln_choose(s + c - j - 1, s - 1, log_factorials);
            ln_coefficient.exp() * alpha.powi((s + c - 2 * j) as i32) * coeff.powi(j as i32)
        })
        .sum();
    sum.max(0.0)
}

fn transition_matrix(
    lambda: f64,
    t: f64,
    domain: &FamilySizeDomain,
    log_factorials: &[f64],
) -> TransitionMatrix {
    (domain.min..=domain.max)
        .map(|s| {
            (domain.min..=domain.max)
                .map(|c| birth_death_probability(s, c, lambda, t, log_factorials))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parser::newick_parser::NewickParser;
    use approx::assert_relative_eq;

    #[test]
    fn single_gene_matches_geometric_form() {
        let lf = log_factorials(20);
        let alpha = 1.0 / 3.0;
        assert_relative_eq!(birth_death_probability(1, 0, 0.5, 1.0, &lf), alpha, epsilon = 1e-12);
        assert_relative_eq!(birth_death_probability(1, 1, 0.5, 1.0, &lf), 4.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(birth_death_probability(1, 2, 0.5, 1.0, &lf), 4.0 / 27.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_time_is_identity() {
        let lf = log_factorials(20);
        for s in 0..5 {
            for c in 0..5 {
                let expected = if s == c { 1.0 } else { 0.0 };
                assert_relative_eq!(birth_death_probability(s, c, 0.3, 0.0, &lf), expected);
            }
        }
    }

    #[test]
    fn extinct_families_stay_extinct() {
        let lf = log_factorials(20);
        assert_eq!(birth_death_probability(0, 0, 0.1, 5.0, &lf), 1.0);
        assert_eq!(birth_death_probability(0, 3, 0.1, 5.0, &lf), 0.0);
    }

    #[test]
    fn rows_do_not_exceed_one() {
        let domain = FamilySizeDomain::for_max_size(5);
        let lf = log_factorials(2 * domain.max as usize + 1);
        let matrix = transition_matrix(0.01, 10.0, &domain, &lf);
        for row in matrix.iter().take(20) {
            let total: f64 = row.iter().sum();
            assert!(total <= 1.0 + 1e-9, "row sums to {}", total);
            assert!(total > 0.99);
        }
    }

    #[test]
    fn lease_releases_on_drop() {
        let mut tree = NewickParser::parse_string("((a:1,b:1):2,c:3);").unwrap();
        tree.set_lambda(0.01);
        let domain = FamilySizeDomain::for_max_size(3);
        let mut cache = BirthDeathCache::new();
        {
            let lease = CacheLease::acquire(&mut cache, &tree, &domain).unwrap();
            assert!(lease.is_ready());
            assert_eq!(lease.cached_branch_count(), 3);
            assert!(lease.transitions(2.0).is_some());
        }
        assert!(!cache.is_ready());
        assert_eq!(cache.cached_branch_count(), 0);
    }

    #[test]
    fn oversized_domain_is_refused() {
        let mut tree = NewickParser::parse_string("(a:1,b:1);").unwrap();
        tree.set_lambda(0.01);
        let domain = FamilySizeDomain::for_max_size(4_000_000_000);
        let mut cache = BirthDeathCache::new();
        let failed = matches!(
            CacheLease::acquire(&mut cache, &tree, &domain),
            Err(ModelError::DomainTooLarge(_))
        );
        assert!(failed);
        assert!(!cache.is_ready());
        assert_eq!(cache.cached_branch_count(), 0);
    }

    #[test]
    fn lease_fails_without_lambda() {
        let tree = NewickParser::parse_string("(a:1,b:1);").unwrap();
        let mut cache = BirthDeathCache::new();
        let failed = matches!(
            CacheLease::acquire(&mut cache, &tree, &FamilySizeDomain::default()),
            Err(ModelError::MissingLambda)
        );
        assert!(failed);
        assert!(!cache.is_ready());
    }
}
