//! Birth-death model of gene family size change along a species tree.
pub mod birthdeath;
pub mod family_size;
pub mod viterbi;

pub use birthdeath::{BirthDeathCache, CacheLease, TransitionCache, TransitionMatrix};
pub use family_size::FamilySizeDomain;
pub use viterbi::{Reconstructor, Viterbi};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no birth rate (lambda) has been set on the tree")]
    MissingLambda,
    #[error("the transition cache has not been filled for this tree")]
    CacheNotReady,
    #[error("branch above node {0} has no length")]
    MissingBranchLength(usize),
    #[error("no transition probabilities cached for branch length {0}")]
    UncachedBranch(f64),
    #[error("family size {size} at node {node} is outside the domain 0..={max}")]
    OutsideDomain { node: usize, size: u32, max: u32 },
    #[error("family size domain {0} has more than {} sizes", birthdeath::MAX_DOMAIN_SIZES)]
    DomainTooLarge(FamilySizeDomain),
    #[error("the family has zero likelihood under the model")]
    ZeroLikelihood,
}
