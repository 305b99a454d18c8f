use super::command_io;
use famtree::crossvalidation::{CrossValidator, ErrorMetric, EvaluatorOptions, MaeAccumulation};
use famtree::io::parser::family_importer::{load_families_from_path, LoadOptions};
use famtree::io::parser::query_importer::load_query_cases_from_path;
use famtree::model::{BirthDeathCache, FamilySizeDomain, Viterbi};
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct CrossValidateArgs {
    pub query: PathBuf,
    pub truth: PathBuf,
    pub tree: PathBuf,
    pub lambda: f64,
    pub metric: String,
    pub posterior: bool,
    pub historical_mae: bool,
    pub report: Option<PathBuf>,
}

// The domain has to cover both the truth counts and the counts fed to the tree.
fn largest_count(query: &Path, truth: &Path) -> Result<u32, Box<dyn Error>> {
    let truth_max = load_families_from_path(truth, &LoadOptions::default())?
        .families
        .max_size();
    let query_max = load_query_cases_from_path(query)?
        .counts
        .into_iter()
        .max()
        .unwrap_or(0);
    Ok(truth_max.max(query_max))
}

pub fn run(args: CrossValidateArgs) -> Result<(), Box<dyn Error>> {
    let metric = ErrorMetric::from_prefix(&args.metric)
        .ok_or_else(|| format!("unknown error metric '{}', expected MSE or MAE", args.metric))?;

    let mut tree = command_io::read_tree(&args.tree)?;
    tree.set_lambda(args.lambda);
    let domain = FamilySizeDomain::for_max_size(largest_count(&args.query, &args.truth)?);
    debug!("family size domain {}", domain);
    tree.set_family_size_domain(&domain);

    let options = EvaluatorOptions {
        posterior: args.posterior,
        mae_accumulation: if args.historical_mae {
            MaeAccumulation::Historical
        } else {
            MaeAccumulation::Corrected
        },
    };
    let mut cache = BirthDeathCache::new();
    let summary = CrossValidator::new(&mut tree, &mut cache, &Viterbi)
        .with_options(options)
        .evaluate(&args.query, &args.truth)?;

    if let Some(report) = args.report.as_ref() {
        summary.write_cases(File::create(report)?)?;
        info!("wrote {} cases to {}", summary.cases.len(), report.display());
    }
    println!("{}\t{:.6}", args.metric, summary.metric(metric));
    Ok(())
}
