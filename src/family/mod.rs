//! Gene family copy-number tables.
use crate::tree::{FamilyTree, TreeIndex};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FamilyError {
    #[error("species '{0}' is not a tip of the tree")]
    SpeciesNotInTree(String),
    #[error("family {0} does not exist, the dataset has {1} families")]
    NoSuchFamily(usize, usize),
    #[error("the species index has not been bound to a tree")]
    IndexNotBound,
    #[error("shared parameter set {0} does not exist")]
    NoSuchParameterSet(usize),
}

/// Per-family birth or death rates.
///
/// `Owned` values belong to the record and go away with it. `Shared` points
/// into the dataset's shared parameter table and is never dropped by the
/// record that refers to it.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSet {
    Owned(Vec<f64>),
    Shared(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyRecord {
    pub description: String,
    pub id: String,
    pub counts: Vec<u32>,
    pub max_likelihood_index: Option<usize>,
    /// Index of the first family with the same count pattern.
    pub reference_index: Option<usize>,
    pub lambda: Option<ParameterSet>,
    pub mu: Option<ParameterSet>,
}

impl FamilyRecord {
    pub fn new(description: &str, id: &str, counts: Vec<u32>) -> Self {
        FamilyRecord {
            description: description.to_string(),
            id: id.to_string(),
            counts,
            max_likelihood_index: None,
            reference_index: None,
            lambda: None,
            mu: None,
        }
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Families sharing one ordered species list.
///
/// Record order is significant; it is the order in which families are
/// replayed on the tree.
#[derive(Debug, Clone)]
pub struct FamilyDataset {
    species: Vec<String>,
    records: Vec<FamilyRecord>,
    max_size: u32,
    index: Vec<Option<TreeIndex>>,
    shared_parameters: Vec<Vec<f64>>,
}

impl FamilyDataset {
    pub fn new(species: Vec<String>) -> Self {
        let index = vec![None; species.len()];
        FamilyDataset {
            species,
            records: Vec::new(),
            max_size: 0,
            index,
            shared_parameters: Vec::new(),
        }
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    pub fn records(&self) -> &[FamilyRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [FamilyRecord] {
        &mut self.records
    }

    pub fn get(&self, i: usize) -> Option<&FamilyRecord> {
        self.records.get(i)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Largest count seen across every family and species.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub(crate) fn set_max_size(&mut self, max_size: u32) {
        self.max_size = max_size;
    }

    /// Tree node of each species, `None` until [`bind_species_index`] is called.
    ///
    /// [`bind_species_index`]: FamilyDataset::bind_species_index
    pub fn index(&self) -> &[Option<TreeIndex>] {
        &self.index
    }

    /// Appends a family. Count vectors of the wrong length are zero-filled or
    /// truncated to the species count; the family is kept either way.
    pub fn add_record(&mut self, mut record: FamilyRecord) {
        if record.counts.len() != self.species.len() {
            warn!(
                "family {} has {} counts for {} species",
                record.id,
                record.counts.len(),
                self.species.len()
            );
            record.counts.resize(self.species.len(), 0);
        }
        self.max_size = self.max_size.max(record.max_count());
        self.records.push(record);
    }

    /// Swaps in a new record collection, returning the old one.
    pub(crate) fn replace_records(&mut self, records: Vec<FamilyRecord>) -> Vec<FamilyRecord> {
        std::mem::replace(&mut self.records, records)
    }

    /// Points every family whose reference is unset at the first family with
    /// an identical count vector (itself when it is the first).
    pub fn check_patterns(&mut self) {
        let mut leaders: HashMap<Vec<u32>, usize> = HashMap::new();
        for (i, record) in self.records.iter_mut().enumerate() {
            match record.reference_index {
                Some(r) if r == i => {
                    leaders.entry(record.counts.clone()).or_insert(i);
                }
                Some(_) => {}
                None => {
                    let leader = *leaders.entry(record.counts.clone()).or_insert(i);
                    record.reference_index = Some(leader);
                }
            }
        }
        debug!(
            "{} distinct count patterns among {} families",
            leaders.len(),
            self.records.len()
        );
    }

    /// Number of distinct count patterns, from the reference indices.
    pub fn pattern_count(&self) -> usize {
        self.records
            .iter()
            .enumerate()
            .filter(|(i, r)| r.reference_index.map_or(true, |ref_i| ref_i == *i))
            .count()
    }

    /// Resolves each species to the tip of `tree` carrying its name.
    pub fn bind_species_index(&mut self, tree: &FamilyTree) -> Result<(), FamilyError> {
        let mut index = Vec::with_capacity(self.species.len());
        for species in self.species.iter() {
            let node = tree
                .get_taxon_node(species)
                .ok_or_else(|| FamilyError::SpeciesNotInTree(species.clone()))?;
            index.push(Some(node));
        }
        self.index = index;
        Ok(())
    }

    /// Writes the counts of family `i` onto the bound tips of `tree`.
    pub fn apply_to_tree(&self, i: usize, tree: &mut FamilyTree) -> Result<(), FamilyError> {
        let record = self
            .records
            .get(i)
            .ok_or(FamilyError::NoSuchFamily(i, self.records.len()))?;
        if !self.species.is_empty() && self.index.iter().all(Option::is_none) {
            return Err(FamilyError::IndexNotBound);
        }
        for (node, count) in self.index.iter().zip(record.counts.iter()) {
            if let Some(node) = node {
                tree.set_family_size(*node, *count);
            }
        }
        Ok(())
    }

    /// Stores a parameter vector that several families can refer to with
    /// [`ParameterSet::Shared`].
    pub fn add_shared_parameters(&mut self, values: Vec<f64>) -> usize {
        self.shared_parameters.push(values);
        self.shared_parameters.len() - 1
    }

    pub fn resolve_parameters<'a>(&'a self, set: &'a ParameterSet) -> Result<&'a [f64], FamilyError> {
        match set {
            ParameterSet::Owned(values) => Ok(values),
            ParameterSet::Shared(i) => self
                .shared_parameters
                .get(*i)
                .map(|v| v.as_slice())
                .ok_or(FamilyError::NoSuchParameterSet(*i)),
        }
    }

    pub fn family_lambda(&self, i: usize) -> Result<Option<&[f64]>, FamilyError> {
        let record = self
            .records
            .get(i)
            .ok_or(FamilyError::NoSuchFamily(i, self.records.len()))?;
        record
            .lambda
            .as_ref()
            .map(|set| self.resolve_parameters(set))
            .transpose()
    }

    pub fn family_mu(&self, i: usize) -> Result<Option<&[f64]>, FamilyError> {
        let record = self
            .records
            .get(i)
            .ok_or(FamilyError::NoSuchFamily(i, self.records.len()))?;
        record
            .mu
            .as_ref()
            .map(|set| self.resolve_parameters(set))
            .transpose()
    }
}
