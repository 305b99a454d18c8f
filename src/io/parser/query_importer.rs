//! Reading cross-validation query files.
//!
//! A query file has a header line followed by one test case per line:
//! `description<TAB>species<TAB>count`. Each case names the species whose
//! count is fed to the reconstruction and the count to feed it.
use super::family_importer::{parse_count, CountField};
use super::tabular::{field_text, Delimiter, TableReader};
use crate::io::error::IoError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Test cases in file order, held as parallel vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryCases {
    pub descriptions: Vec<String>,
    pub species: Vec<String>,
    pub counts: Vec<u32>,
}

impl QueryCases {
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn push(&mut self, description: &str, species: &str, count: u32) {
        self.descriptions.push(description.to_string());
        self.species.push(species.to_string());
        self.counts.push(count);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.species
            .iter()
            .map(String::as_str)
            .zip(self.counts.iter().copied())
    }
}

pub fn load_query_cases_from_path(path: &Path) -> Result<QueryCases, IoError> {
    let file = File::open(path)?;
    load_query_cases(BufReader::new(file))
}

pub fn load_query_cases<R: BufRead>(reader: R) -> Result<QueryCases, IoError> {
    let mut cases = QueryCases::default();
    let mut rows = TableReader::new(reader, Delimiter::Char('\t'))?;
    // the header only labels the columns
    if rows.next_row()?.is_none() {
        return Ok(cases);
    }
    while let Some((line, fields)) = rows.next_row()? {
        if fields.len() < 3 {
            warn!(
                "line {} of the query file has {} fields, expected description, species and count",
                line,
                fields.len()
            );
            continue;
        }
        let raw = field_text(&fields, 2);
        let count = match parse_count(&raw) {
            CountField::Parsed(v) => v,
            other => {
                warn!(
                    "line {} of the query file has an unusable count '{}', read as 0",
                    line, raw
                );
                other.value()
            }
        };
        cases.push(&field_text(&fields, 0), &field_text(&fields, 1), count);
    }
    debug!("read {} query cases", cases.len());
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cases_in_order() {
        let text = "Desc\tSpecies\tCount\nfam1\tchimp\t3\nfam2\thuman\t0\n";
        let cases = load_query_cases(text.as_bytes()).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases.iter().collect::<Vec<_>>(), vec![("chimp", 3), ("human", 0)]);
        assert_eq!(cases.descriptions, vec!["fam1", "fam2"]);
    }

    #[test]
    fn header_only_has_no_cases() {
        let cases = load_query_cases("Desc\tSpecies\tCount\n".as_bytes()).unwrap();
        assert!(cases.is_empty());
        assert!(load_query_cases("".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn invalid_bytes_do_not_drop_later_cases() {
        let text = b"Desc\tSpecies\tCount\nfam\xe91\tchimp\t3\nfam2\thuman\t1\n";
        let cases = load_query_cases(&text[..]).unwrap();
        assert_eq!(cases.iter().collect::<Vec<_>>(), vec![("chimp", 3), ("human", 1)]);
        assert_eq!(cases.descriptions[0], "fam\u{fffd}1");
    }

    #[test]
    fn short_rows_are_skipped() {
        let text = "Desc\tSpecies\tCount\nfam1\tchimp\nfam2\thuman\t4\n";
        let cases = load_query_cases(text.as_bytes()).unwrap();
        assert_eq!(cases.iter().collect::<Vec<_>>(), vec![("human", 4)]);
    }
}
