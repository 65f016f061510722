use thiserror::Error;

/// Errors produced when decoding externally supplied values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid location: {0}")]
    Location(String),

    #[error("invalid access link: {0}")]
    Link(String),
}
