use thiserror::Error;

/// Fatal normalization failures. Anything listed here aborts the pass;
/// recoverable conditions end up as warnings in the report instead.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("source is empty or has no header row")]
    EmptySource,

    #[error("source is not tabular: {0}")]
    NotTabular(String),

    #[error("header '{header}' looks {delimiter}-delimited, expected commas")]
    WrongDelimiter { header: String, delimiter: &'static str },

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<calamine::Error> for NormalizeError {
    fn from(err: calamine::Error) -> Self {
        NormalizeError::Workbook(err.to_string())
    }
}
