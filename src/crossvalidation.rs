//! Leave-one-out style evaluation of ancestral reconstruction.
//!
//! Each query case feeds one observed count to one species of the live tree,
//! reconstructs, and compares the tips of the live tree with the matching
//! family of a truth table.
use crate::family::FamilyError;
use crate::io::error::IoError;
use crate::io::parser::family_importer::{load_families_from_path, LoadOptions};
use crate::io::parser::query_importer::load_query_cases_from_path;
use crate::io::parser::tabular::Delimiter;
use crate::model::{CacheLease, ModelError, Reconstructor, TransitionCache};
use crate::tree::FamilyTree;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Returned by [`CrossValidator::evaluate_by_family`] whenever evaluation fails.
pub const ERROR_SENTINEL: f64 = -1.0;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("no test cases in query file {}", .path.display())]
    NoTestCases { path: PathBuf },
    #[error("failed to read query file {}: {source}", .path.display())]
    Query { path: PathBuf, source: IoError },
    #[error("failed to read in true values {}: {source}", .path.display())]
    Truth { path: PathBuf, source: IoError },
    #[error("truth table has {families} families for {cases} test cases")]
    TruthTooShort { cases: usize, families: usize },
    #[error(transparent)]
    Family(#[from] FamilyError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorMetric {
    Mse,
    Mae,
}

impl ErrorMetric {
    /// Picks the metric named by the first three bytes of `name`, case-sensitively.
    pub fn from_prefix(name: &str) -> Option<Self> {
        match name.as_bytes().get(..3) {
            Some(b"MSE") => Some(ErrorMetric::Mse),
            Some(b"MAE") => Some(ErrorMetric::Mae),
            _ => None,
        }
    }
}

/// How per-case absolute errors are totalled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaeAccumulation {
    /// Squared and absolute errors go to their own totals.
    Corrected,
    /// Both per-case errors are added to the MSE total and the MAE total
    /// stays 0. Reproduces results of the older tool.
    Historical,
}

impl Default for MaeAccumulation {
    fn default() -> Self {
        MaeAccumulation::Corrected
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluatorOptions {
    pub posterior: bool,
    pub mae_accumulation: MaeAccumulation,
}

/// Error of one query case over the tips of the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseError {
    #[serde(rename = "Desc")]
    pub description: String,
    #[serde(rename = "Species")]
    pub species: String,
    #[serde(rename = "Count")]
    pub count: u32,
    #[serde(rename = "SSE")]
    pub sse: f64,
    #[serde(rename = "SAE")]
    pub sae: f64,
    #[serde(rename = "Leaves")]
    pub leaves: usize,
    #[serde(rename = "MSE")]
    pub mse: f64,
    #[serde(rename = "MAE")]
    pub mae: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationSummary {
    pub mse: f64,
    pub mae: f64,
    pub cases: Vec<CaseError>,
}

impl CrossValidationSummary {
    pub fn metric(&self, metric: ErrorMetric) -> f64 {
        match metric {
            ErrorMetric::Mse => self.mse,
            ErrorMetric::Mae => self.mae,
        }
    }

    /// Writes one tab separated row per case.
    pub fn write_cases<W: Write>(&self, writer: W) -> Result<(), IoError> {
        let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);
        for case in self.cases.iter() {
            wtr.serialize(case)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Runs query cases against the live tree.
///
/// The live tree keeps the counts set by earlier cases: only the tip of the
/// species named by each case is overwritten, internal nodes are replaced by
/// the reconstruction.
pub struct CrossValidator<'a> {
    tree: &'a mut FamilyTree,
    cache: &'a mut dyn TransitionCache,
    reconstructor: &'a dyn Reconstructor,
    options: EvaluatorOptions,
}

impl<'a> CrossValidator<'a> {
    pub fn new(
        tree: &'a mut FamilyTree,
        cache: &'a mut dyn TransitionCache,
        reconstructor: &'a dyn Reconstructor,
    ) -> Self {
        CrossValidator {
            tree,
            cache,
            reconstructor,
            options: EvaluatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvaluatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn evaluate(&mut self, query: &Path, truth: &Path) -> Result<CrossValidationSummary, EvaluationError> {
        let cases = load_query_cases_from_path(query).map_err(|source| EvaluationError::Query {
            path: query.to_path_buf(),
            source,
        })?;
        if cases.is_empty() {
            return Err(EvaluationError::NoTestCases {
                path: query.to_path_buf(),
            });
        }

        let options = LoadOptions {
            delimiter: Delimiter::Char('\t'),
            check_pattern: true,
        };
        let mut truth_families = load_families_from_path(truth, &options)
            .map_err(|source| EvaluationError::Truth {
                path: truth.to_path_buf(),
                source,
            })?
            .families;

        let mut truth_tree = self.tree.clone();
        truth_families.bind_species_index(&truth_tree)?;

        let domain = self.tree.family_size_domain().clone();
        let lease = CacheLease::acquire(&mut *self.cache, &*self.tree, &domain)?;

        let mut case_errors = Vec::with_capacity(cases.len());
        let mut mse_total = 0.0;
        let mut mae_total = 0.0;
        for (k, (species, count)) in cases.iter().enumerate() {
            if k >= truth_families.len() {
                return Err(EvaluationError::TruthTooShort {
                    cases: cases.len(),
                    families: truth_families.len(),
                });
            }
            truth_families.apply_to_tree(k, &mut truth_tree)?;
            if !self.tree.set_family_size_by_species(species, count) {
                warn!("test species {} is not a tip of the tree, case {} left unassigned", species, k);
            }
            if self.options.posterior {
                self.reconstructor.reconstruct_posterior(self.tree, &*lease)?;
            } else {
                self.reconstructor.reconstruct(self.tree, &*lease)?;
            }

            let mut sse = 0.0;
            let mut sae = 0.0;
            let mut leaves = 0;
            for node in (0..self.tree.get_node_count()).step_by(2) {
                let error =
                    f64::from(truth_tree.get_family_size(node)) - f64::from(self.tree.get_family_size(node));
                sse += error * error;
                sae += error.abs();
                leaves += 1;
            }
            let case = CaseError {
                description: cases.descriptions[k].clone(),
                species: species.to_string(),
                count,
                sse,
                sae,
                leaves,
                mse: sse / leaves as f64,
                mae: sae / leaves as f64,
            };
            trace!("case {} ({} = {}): SSE {} SAE {}", k, species, count, sse, sae);
            match self.options.mae_accumulation {
                MaeAccumulation::Corrected => {
                    mse_total += case.mse;
                    mae_total += case.mae;
                }
                MaeAccumulation::Historical => {
                    mse_total += case.mse;
                    mse_total += case.mae;
                }
            }
            case_errors.push(case);
        }
        drop(lease);

        let n = cases.len() as f64;
        let summary = CrossValidationSummary {
            mse: mse_total / n,
            mae: mae_total / n,
            cases: case_errors,
        };
        info!("MSE {:.6}", summary.mse);
        match self.options.mae_accumulation {
            MaeAccumulation::Corrected => info!("MAE {:.6}", summary.mae),
            MaeAccumulation::Historical => info!("MAE {:.6}", summary.mse),
        }
        Ok(summary)
    }

    /// Evaluates and returns the metric named by `metric`, or
    /// [`ERROR_SENTINEL`] when evaluation fails or the metric is unknown.
    pub fn evaluate_by_family(&mut self, query: &Path, truth: &Path, metric: &str) -> f64 {
        let summary = match self.evaluate(query, truth) {
            Ok(summary) => summary,
            Err(e) => {
                error!("{}", e);
                return ERROR_SENTINEL;
            }
        };
        match ErrorMetric::from_prefix(metric) {
            Some(metric) => summary.metric(metric),
            None => {
                warn!("unknown error metric '{}', expected MSE or MAE", metric);
                ERROR_SENTINEL
            }
        }
    }
}
