use super::command_io;
use famtree::io::writer::newick_writer::write_newick;
use famtree::model::{BirthDeathCache, CacheLease, FamilySizeDomain, Reconstructor, Viterbi};
use std::error::Error;
use std::io::Write;
use std::path::Path;

pub fn run(
    infile: &Path,
    tree_file: &Path,
    outfile: Option<&Path>,
    lambda: f64,
    posterior: bool,
    comma_as_whitespace: bool,
) -> Result<(), Box<dyn Error>> {
    let mut families = command_io::read_families(infile, comma_as_whitespace)?;
    let mut tree = command_io::read_tree(tree_file)?;
    tree.set_lambda(lambda);
    let domain = FamilySizeDomain::for_max_size(families.max_size());
    tree.set_family_size_domain(&domain);
    families.bind_species_index(&tree)?;

    let mut out = command_io::output(outfile)?;
    let mut cache = BirthDeathCache::new();
    let lease = CacheLease::acquire(&mut cache, &tree, &domain)?;
    for (i, record) in families.records().iter().enumerate() {
        families.apply_to_tree(i, &mut tree)?;
        if posterior {
            Viterbi.reconstruct_posterior(&mut tree, &*lease)?;
        } else {
            Viterbi.reconstruct(&mut tree, &*lease)?;
        }
        writeln!(out, "{}\t{}", record.id, write_newick(&tree))?;
    }
    out.flush()?;
    Ok(())
}
