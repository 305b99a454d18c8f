mod commands;

use clap_verbosity_flag::Verbosity;
use commands::crossvalidate::CrossValidateArgs;
use commands::{crossvalidate, filter, holdout, reconstruct, stats};
use famtree::crossvalidation::EvaluationError;
use famtree::io::error::IoError;
use std::error::Error;
use std::path;
use structopt::StructOpt;

#[macro_use]
extern crate log;

#[derive(Debug, StructOpt)]
#[structopt(about = "gene family size tools on a species tree")]
enum Famtree {
    /// Drop families that are not present on both sides of the root
    Filter {
        #[structopt(flatten)]
        common: Common,
        #[structopt(short, long, parse(from_os_str), help = "species tree in newick format")]
        tree: path::PathBuf,
        #[structopt(short, long, parse(from_os_str), help = "output family file")]
        outfile: Option<path::PathBuf>,
    },
    /// Score reconstructions of held out counts against the true families
    CrossValidate {
        #[structopt(flatten)]
        verbose: Verbosity,
        #[structopt(short = "Q", long, parse(from_os_str), help = "query file: desc, species, count")]
        query: path::PathBuf,
        #[structopt(short = "T", long, parse(from_os_str), help = "family file with the true counts")]
        truth: path::PathBuf,
        #[structopt(short, long, parse(from_os_str), help = "species tree in newick format")]
        tree: path::PathBuf,
        #[structopt(short, long)]
        lambda: f64,
        #[structopt(short, long, default_value = "MSE")]
        metric: String,
        #[structopt(long)]
        posterior: bool,
        #[structopt(long, help = "fold MAE into the MSE total like older releases")]
        historical_mae: bool,
        #[structopt(long, parse(from_os_str), help = "per case error table")]
        report: Option<path::PathBuf>,
    },
    /// Split a family file into query and truth files for cross-validation
    Holdout {
        #[structopt(flatten)]
        common: Common,
        #[structopt(short = "Q", long, parse(from_os_str))]
        query: path::PathBuf,
        #[structopt(short = "T", long, parse(from_os_str))]
        truth: path::PathBuf,
        #[structopt(long)]
        seed: Option<u64>,
    },
    /// Write one newick tree per family with reconstructed ancestral sizes
    Reconstruct {
        #[structopt(flatten)]
        common: Common,
        #[structopt(short, long, parse(from_os_str), help = "species tree in newick format")]
        tree: path::PathBuf,
        #[structopt(short, long, parse(from_os_str), help = "output tree file")]
        outfile: Option<path::PathBuf>,
        #[structopt(short, long)]
        lambda: f64,
        #[structopt(long)]
        posterior: bool,
    },
    /// Summarise a family file: species, families, largest size and distinct patterns
    Stats {
        #[structopt(flatten)]
        common: Common,
    },
}

#[derive(Debug, StructOpt)]
pub struct Common {
    #[structopt(short, long, parse(from_os_str), help = "input family file")]
    infile: path::PathBuf,
    #[structopt(long, help = "treat commas in the family file as whitespace")]
    comma: bool,
    #[structopt(flatten)]
    verbose: Verbosity,
}

impl Famtree {
    fn verbosity(&self) -> &Verbosity {
        match self {
            Famtree::Filter { common, .. }
            | Famtree::Holdout { common, .. }
            | Famtree::Reconstruct { common, .. }
            | Famtree::Stats { common } => &common.verbose,
            Famtree::CrossValidate { verbose, .. } => verbose,
        }
    }
}

fn exit_code(e: &(dyn Error + 'static)) -> i32 {
    let io = match e.downcast_ref::<EvaluationError>() {
        Some(EvaluationError::Query { source, .. }) | Some(EvaluationError::Truth { source, .. }) => Some(source),
        _ => e.downcast_ref::<IoError>(),
    };
    match io {
        Some(IoError::Io(_)) => exitcode::IOERR,
        _ if e.is::<std::io::Error>() => exitcode::IOERR,
        _ => exitcode::DATAERR,
    }
}

fn main() {
    let args = Famtree::from_args();
    let level = args
        .verbosity()
        .log_level()
        .map_or(log::LevelFilter::Off, |l| l.to_level_filter());
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
    info!("starting up");
    debug!("{:?}", args);
    let start = std::time::Instant::now();
    let result = match args {
        Famtree::Filter {
            common,
            tree,
            outfile,
        } => filter::run(&common.infile, &tree, outfile.as_deref(), common.comma),
        Famtree::CrossValidate {
            verbose: _,
            query,
            truth,
            tree,
            lambda,
            metric,
            posterior,
            historical_mae,
            report,
        } => crossvalidate::run(CrossValidateArgs {
            query,
            truth,
            tree,
            lambda,
            metric,
            posterior,
            historical_mae,
            report,
        }),
        Famtree::Holdout {
            common,
            query,
            truth,
            seed,
        } => holdout::run(&common.infile, &query, &truth, seed, common.comma),
        Famtree::Reconstruct {
            common,
            tree,
            outfile,
            lambda,
            posterior,
        } => reconstruct::run(
            &common.infile,
            &tree,
            outfile.as_deref(),
            lambda,
            posterior,
            common.comma,
        ),
        Famtree::Stats { common } => stats::run(&common.infile, common.comma),
    };
    info!("{} seconds elapsed", start.elapsed().as_secs());
    match result {
        Ok(_) => {
            std::process::exit(exitcode::OK);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_code(e.as_ref()));
        }
    }
}
