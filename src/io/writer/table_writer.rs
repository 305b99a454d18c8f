//! Writing family tables and query files in the formats the importers read.
use crate::family::FamilyDataset;
use crate::io::error::IoError;
use crate::io::parser::query_importer::QueryCases;
use csv::{QuoteStyle, WriterBuilder};
use std::io::Write;

pub fn write_families<W: Write>(writer: W, families: &FamilyDataset, delimiter: u8) -> Result<(), IoError> {
    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Never)
        .flexible(true)
        .from_writer(writer);

    let mut header = vec!["Desc".to_string(), "Family ID".to_string()];
    header.extend(families.species().iter().cloned());
    wtr.write_record(&header)?;

    for record in families.records() {
        let mut row = vec![record.description.clone(), record.id.clone()];
        row.extend(record.counts.iter().map(|c| c.to_string()));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_query_cases<W: Write>(writer: W, cases: &QueryCases) -> Result<(), IoError> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);
    wtr.write_record(&["Desc", "Species", "Count"])?;
    for ((description, species), count) in cases
        .descriptions
        .iter()
        .zip(cases.species.iter())
        .zip(cases.counts.iter())
    {
        wtr.write_record(&[description.as_str(), species.as_str(), count.to_string().as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}
