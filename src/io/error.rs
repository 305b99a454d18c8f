use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unexpected end of input")]
    Eof,
    #[error("badly formatted input: {0}")]
    Format(String),
    #[error("taxon '{0}' appears more than once in the tree")]
    DuplicateTaxon(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
