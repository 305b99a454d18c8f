use super::command_io;
use famtree::io::parser::query_importer::QueryCases;
use famtree::io::writer::table_writer::{write_families, write_query_cases};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::fs::File;
use std::path::Path;

/// Picks one species per family at random. The query file gets that
/// species and its count, the truth file the whole family.
pub fn run(
    infile: &Path,
    query: &Path,
    truth: &Path,
    seed: Option<u64>,
    comma_as_whitespace: bool,
) -> Result<(), Box<dyn Error>> {
    let families = command_io::read_families(infile, comma_as_whitespace)?;
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut cases = QueryCases::default();
    for record in families.records() {
        let pick = rng.gen_range(0..families.species_count());
        cases.push(&record.id, &families.species()[pick], record.counts[pick]);
    }
    info!("held out one species in each of {} families", cases.len());

    write_query_cases(File::create(query)?, &cases)?;
    write_families(File::create(truth)?, &families, b'\t')?;
    Ok(())
}
