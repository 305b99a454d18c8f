use super::command_io;
use std::error::Error;
use std::io::Write;
use std::path::Path;

pub fn run(infile: &Path, comma_as_whitespace: bool) -> Result<(), Box<dyn Error>> {
    let mut families = command_io::read_families(infile, comma_as_whitespace)?;
    families.check_patterns();

    let stdout = std::io::stdout(); // get the global stdout entity
    let mut handle = stdout.lock(); // acquire a lock on it
    writeln!(handle, "species\tfamilies\tmaxSize\tpatterns")?;
    writeln!(
        handle,
        "{}\t{}\t{}\t{}",
        families.species_count(),
        families.len(),
        families.max_size(),
        families.pattern_count()
    )?;
    Ok(())
}
