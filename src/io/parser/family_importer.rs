//! Reading gene family tables.
//!
//! The first line names the columns: two placeholder columns (description and
//! id) followed by one column per species. Every other line is a family:
//! description, id, then one copy number per species.
//!
//! Ingestion is lenient. Rows with the wrong number of fields are kept, with
//! missing counts read as 0. Counts that are empty, non-numeric or negative
//! are read as 0, and text that is not UTF-8 is decoded lossily. Every such
//! repair is reported as a [`Diagnostic`] rather than failing the load.
use super::tabular::{field_is_mangled, field_text, Delimiter, TableReader};
use crate::family::{FamilyDataset, FamilyRecord};
use crate::io::error::IoError;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: Delimiter,
    /// Assign reference indices to families with repeated count patterns.
    pub check_pattern: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            delimiter: Delimiter::default(),
            check_pattern: false,
        }
    }
}

/// A repair made while reading a table. Lines are 1-based and include the
/// header; columns are 0-based field positions.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    RowShape {
        line: usize,
        expected: usize,
        found: usize,
    },
    NonNumericCount {
        line: usize,
        column: usize,
        value: String,
    },
    NegativeCount {
        line: usize,
        column: usize,
        value: String,
    },
    InvalidText {
        line: usize,
        column: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Diagnostic::RowShape {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {}: inconsistency in column count, expected {} but found {}",
                line, expected, found
            ),
            Diagnostic::NonNumericCount {
                line,
                column,
                value,
            } => write!(
                f,
                "line {}: column {} has non-numeric count '{}', read as 0",
                line, column, value
            ),
            Diagnostic::NegativeCount {
                line,
                column,
                value,
            } => write!(
                f,
                "line {}: column {} has negative count '{}', read as 0",
                line, column, value
            ),
            Diagnostic::InvalidText { line, column } => write!(
                f,
                "line {}: column {} is not valid UTF-8, unreadable bytes replaced",
                line, column
            ),
        }
    }
}

#[derive(Debug)]
pub struct LoadedFamilies {
    pub families: FamilyDataset,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CountField {
    Parsed(u32),
    Empty,
    NonNumeric,
    Negative,
}

impl CountField {
    pub(crate) fn value(self) -> u32 {
        match self {
            CountField::Parsed(v) => v,
            _ => 0,
        }
    }
}

/// Reads the leading integer of `field` the way C's `atoi` does: leading
/// whitespace and a sign are allowed, anything after the digits is ignored.
pub(crate) fn parse_count(field: &str) -> CountField {
    let trimmed = field.trim_start();
    if trimmed.trim_end().is_empty() {
        return CountField::Empty;
    }
    let (negative, digits) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = &digits[..digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or_else(|| digits.len())];
    if digits.is_empty() {
        return CountField::NonNumeric;
    }
    let value = digits
        .bytes()
        .fold(0u64, |acc, b| (acc * 10 + u64::from(b - b'0')).min(u64::from(u32::MAX)));
    if negative && value > 0 {
        CountField::Negative
    } else {
        CountField::Parsed(value as u32)
    }
}

pub fn load_families_from_path(path: &Path, options: &LoadOptions) -> Result<LoadedFamilies, IoError> {
    let file = File::open(path)?;
    load_families(BufReader::new(file), options)
}

pub fn load_families<R: BufRead>(reader: R, options: &LoadOptions) -> Result<LoadedFamilies, IoError> {
    let mut rows = TableReader::new(reader, options.delimiter)?;
    let mut diagnostics = Vec::new();

    let (header_line, header) = match rows.next_row()? {
        Some(row) => row,
        None => {
            return Err(IoError::Format(
                "the family table is empty, expected a header line".to_string(),
            ))
        }
    };
    if header.len() < 4 {
        return Err(IoError::Format(format!(
            "failed to identify species for gene families: header has {} columns, \
             expected description, id and at least two species ({} delimited)",
            header.len(),
            options.delimiter
        )));
    }
    // first two items are description and id
    let mut species = Vec::with_capacity(header.len() - 2);
    for column in 2..header.len() {
        if field_is_mangled(&header, column) {
            diagnostics.push(Diagnostic::InvalidText {
                line: header_line,
                column,
            });
        }
        species.push(field_text(&header, column).into_owned());
    }
    let species_count = species.len();
    let mut families = FamilyDataset::new(species);

    while let Some((line_number, fields)) = rows.next_row()? {
        if fields.len() != species_count + 2 {
            diagnostics.push(Diagnostic::RowShape {
                line: line_number,
                expected: species_count + 2,
                found: fields.len(),
            });
        }
        for column in 0..2 {
            if field_is_mangled(&fields, column) {
                diagnostics.push(Diagnostic::InvalidText {
                    line: line_number,
                    column,
                });
            }
        }
        let description = field_text(&fields, 0);
        let id = field_text(&fields, 1);
        let mut counts = Vec::with_capacity(species_count);
        for column in 2..species_count + 2 {
            let field = field_text(&fields, column);
            let parsed = parse_count(&field);
            match parsed {
                CountField::NonNumeric => diagnostics.push(Diagnostic::NonNumericCount {
                    line: line_number,
                    column,
                    value: field.into_owned(),
                }),
                CountField::Negative => diagnostics.push(Diagnostic::NegativeCount {
                    line: line_number,
                    column,
                    value: field.into_owned(),
                }),
                _ => {}
            }
            counts.push(parsed.value());
        }
        families.add_record(FamilyRecord::new(&description, &id, counts));
    }

    for diagnostic in diagnostics.iter() {
        warn!("{}", diagnostic);
    }
    if options.check_pattern {
        families.check_patterns();
    }
    info!(
        "read {} families for {} species, largest family size {}",
        families.len(),
        families.species_count(),
        families.max_size()
    );
    Ok(LoadedFamilies {
        families,
        diagnostics,
    })
}
