use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaffleError {
    /// Window sizes must be odd so that a single center cell exists
    #[error("waffle size must be odd and positive, got {0}")]
    InvalidWaffleSize(usize),

    #[error("unknown decay metric '{0}', expected 'loop' or 'no-loop'")]
    UnknownMetric(String),

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("chromosome '{0}' is not in the chromosome sizes")]
    UnknownChrom(String),

    #[error("expected {expected} header lines but the file has only {found} lines")]
    ShortHeader { expected: usize, found: usize },
}

impl WaffleError {
    pub fn malformed(line: usize, message: impl Into<String>) -> Self {
        WaffleError::Malformed {
            line,
            message: message.into(),
        }
    }
}
