pub mod crossvalidate;
pub mod filter;
pub mod holdout;
pub mod reconstruct;
pub mod stats;

pub mod command_io {
    use famtree::family::FamilyDataset;
    use famtree::io::parser::family_importer::{load_families_from_path, LoadOptions};
    use famtree::io::parser::newick_parser::NewickParser;
    use famtree::io::parser::tabular::Delimiter;
    use famtree::tree::FamilyTree;
    use std::error::Error;
    use std::fs::File;
    use std::io::{self, BufWriter, Write};
    use std::path::Path;

    /// Reads the first tree of a Newick file.
    pub fn read_tree(path: &Path) -> Result<FamilyTree, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)?;
        let tree = NewickParser::parse_string(&text)?;
        debug!(
            "read tree with {} tips from {}",
            tree.get_external_node_count(),
            path.display()
        );
        Ok(tree)
    }

    pub fn read_families(path: &Path, comma_as_whitespace: bool) -> Result<FamilyDataset, Box<dyn Error>> {
        let options = LoadOptions {
            delimiter: if comma_as_whitespace {
                Delimiter::CommaAsWhitespace
            } else {
                Delimiter::default()
            },
            check_pattern: false,
        };
        let loaded = load_families_from_path(path, &options)?;
        if !loaded.diagnostics.is_empty() {
            info!("{} lines of {} were repaired", loaded.diagnostics.len(), path.display());
        }
        Ok(loaded.families)
    }

    /// The file at `path`, or stdout when no path is given.
    pub fn output(path: Option<&Path>) -> Result<Box<dyn Write>, Box<dyn Error>> {
        Ok(match path {
            None => Box::new(BufWriter::new(io::stdout())),
            Some(p) => Box::new(BufWriter::new(File::create(p)?)),
        })
    }
}
