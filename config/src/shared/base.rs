use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its accepted range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// The consistency ladder has no levels to try.
    #[error("`consistency_ladder` must contain at least one consistency level")]
    EmptyConsistencyLadder,
    /// The column inclusion pattern is not a valid regular expression.
    #[error("`columns_regexp` is not a valid regular expression: {0}")]
    InvalidColumnsRegexp(String),
}
