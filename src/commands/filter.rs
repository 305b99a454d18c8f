use super::command_io;
use famtree::filter::PresenceFilter;
use famtree::io::writer::table_writer::write_families;
use famtree::model::FamilySizeDomain;
use std::error::Error;
use std::path::Path;

pub fn run(
    infile: &Path,
    tree_file: &Path,
    outfile: Option<&Path>,
    comma_as_whitespace: bool,
) -> Result<(), Box<dyn Error>> {
    let mut families = command_io::read_families(infile, comma_as_whitespace)?;
    let mut tree = command_io::read_tree(tree_file)?;
    let mut domain = FamilySizeDomain::for_max_size(families.max_size());
    tree.set_family_size_domain(&domain);

    let outcome = PresenceFilter.apply(&mut families, &mut tree, &mut domain)?;
    info!(
        "kept {} of {} families, largest family size {} ==> {}",
        outcome.families_after, outcome.families_before, outcome.max_size_before, outcome.max_size_after
    );
    debug!("family size domain is now {}", domain);

    let out = command_io::output(outfile)?;
    write_families(out, &families, b'\t')?;
    Ok(())
}
