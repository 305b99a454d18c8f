//! Row reading for delimited family tables.
//!
//! Rows come back as raw [`ByteRecord`]s so a stray non-UTF-8 byte only
//! affects the field it sits in.
use crate::io::error::IoError;
use csv::{ByteRecord, ReaderBuilder};
use regex::bytes::Regex;
use std::borrow::Cow;
use std::fmt;
use std::io::BufRead;

/// How a line is cut into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Split on every occurrence of the character. Adjacent delimiters give
    /// empty fields.
    Char(char),
    /// Split on runs of whitespace, counting commas as whitespace. Runs merge
    /// and no empty fields are produced.
    CommaAsWhitespace,
}

impl Default for Delimiter {
    fn default() -> Self {
        Delimiter::Char('\t')
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Delimiter::Char('\t') => write!(f, "tab"),
            Delimiter::Char(c) => write!(f, "'{}'", c),
            Delimiter::CommaAsWhitespace => write!(f, "whitespace/comma"),
        }
    }
}

enum Source<R: BufRead> {
    Strict(csv::Reader<R>),
    Runs {
        reader: R,
        separator: Regex,
        line: usize,
        buffer: Vec<u8>,
    },
}

/// Reads non-blank rows of a table together with their 1-based line number.
pub struct TableReader<R: BufRead> {
    source: Source<R>,
}

impl<R: BufRead> TableReader<R> {
    pub fn new(reader: R, delimiter: Delimiter) -> Result<Self, IoError> {
        let source = match delimiter {
            Delimiter::Char(c) if c.is_ascii() => Source::Strict(
                ReaderBuilder::new()
                    .delimiter(c as u8)
                    .has_headers(false)
                    .flexible(true)
                    .quoting(false)
                    .from_reader(reader),
            ),
            Delimiter::Char(c) => {
                return Err(IoError::Format(format!(
                    "delimiter '{}' is not a single byte character",
                    c
                )))
            }
            Delimiter::CommaAsWhitespace => Source::Runs {
                reader,
                separator: whitespace_runs(),
                line: 0,
                buffer: Vec::new(),
            },
        };
        Ok(TableReader { source })
    }

    /// The next row with at least one non-blank field, or `None` at the end
    /// of the input.
    pub fn next_row(&mut self) -> Result<Option<(usize, ByteRecord)>, IoError> {
        loop {
            let (line, record) = match &mut self.source {
                Source::Strict(rdr) => {
                    let mut record = ByteRecord::new();
                    if !rdr.read_byte_record(&mut record)? {
                        return Ok(None);
                    }
                    let line = record.position().map_or(0, |p| p.line() as usize);
                    (line, record)
                }
                Source::Runs {
                    reader,
                    separator,
                    line,
                    buffer,
                } => {
                    buffer.clear();
                    if reader.read_until(b'\n', buffer)? == 0 {
                        return Ok(None);
                    }
                    *line += 1;
                    let record: ByteRecord = separator
                        .split(buffer)
                        .filter(|token| !token.is_empty())
                        .collect();
                    (*line, record)
                }
            };
            if record.iter().all(|field| field.iter().all(u8::is_ascii_whitespace)) {
                trace!("skipping blank line {}", line);
                continue;
            }
            return Ok(Some((line, record)));
        }
    }
}

fn whitespace_runs() -> Regex {
    Regex::new(r"(?-u)[\s,]+").expect("static pattern is valid")
}

/// Field `i` of `record` as text; invalid UTF-8 is replaced. Missing fields
/// read as empty.
pub fn field_text(record: &ByteRecord, i: usize) -> Cow<'_, str> {
    record
        .get(i)
        .map_or(Cow::Borrowed(""), String::from_utf8_lossy)
}

/// Whether field `i` exists and is not valid UTF-8.
pub fn field_is_mangled(record: &ByteRecord, i: usize) -> bool {
    record
        .get(i)
        .map_or(false, |field| std::str::from_utf8(field).is_err())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(text: &[u8], delimiter: Delimiter) -> Vec<(usize, Vec<String>)> {
        let mut reader = TableReader::new(text, delimiter).unwrap();
        let mut rows = vec![];
        while let Some((line, record)) = reader.next_row().unwrap() {
            let fields = (0..record.len()).map(|i| field_text(&record, i).into_owned()).collect();
            rows.push((line, fields));
        }
        rows
    }

    #[test]
    fn strict_split_keeps_empty_fields() {
        assert_eq!(
            rows(b"desc\tid\t\t3\n", Delimiter::Char('\t')),
            vec![(1, vec!["desc".to_string(), "id".into(), "".into(), "3".into()])]
        );
    }

    #[test]
    fn strict_split_does_not_trim_or_unquote() {
        assert_eq!(
            rows(b" a , \"b\"\r\n", Delimiter::Char(',')),
            vec![(1, vec![" a ".to_string(), " \"b\"".into()])]
        );
    }

    #[test]
    fn blank_lines_are_skipped_but_counted() {
        let found = rows(b"a\tb\n\n \t \nc\td\n", Delimiter::Char('\t'));
        let lines: Vec<usize> = found.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![1, 4]);
    }

    #[test]
    fn comma_whitespace_merges_runs() {
        assert_eq!(
            rows(b"  a,, b\t,c  \r\n\nd e\n", Delimiter::CommaAsWhitespace),
            vec![
                (1, vec!["a".to_string(), "b".into(), "c".into()]),
                (3, vec!["d".to_string(), "e".into()]),
            ]
        );
    }

    #[test]
    fn delimiter_picks_mode_per_call() {
        let line = b"x,y,1,,2";
        assert_eq!(rows(line, Delimiter::Char(','))[0].1.len(), 5);
        assert_eq!(rows(line, Delimiter::CommaAsWhitespace)[0].1.len(), 4);
    }

    #[test]
    fn invalid_bytes_stay_in_their_field() {
        let mut reader = TableReader::new(&b"prot\xe9ine\tf2\t2\n"[..], Delimiter::default()).unwrap();
        let (_, record) = reader.next_row().unwrap().unwrap();
        assert!(field_is_mangled(&record, 0));
        assert!(!field_is_mangled(&record, 1));
        assert!(!field_is_mangled(&record, 7));
        assert_eq!(field_text(&record, 0), "prot\u{fffd}ine");
        assert_eq!(field_text(&record, 2), "2");
    }

    #[test]
    fn wide_delimiters_are_rejected() {
        assert!(TableReader::new(&b""[..], Delimiter::Char('→')).is_err());
    }
}
