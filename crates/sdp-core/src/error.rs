use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or building SDP documents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A line or attribute could not be parsed
    #[error("SDP parsing error: {0}")]
    SdpParsingError(String),

    /// The document is structurally invalid (missing or misplaced lines)
    #[error("Invalid SDP format: {0}")]
    InvalidFormat(String),

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl From<nom::Err<nom::error::Error<&str>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        Error::SdpParsingError(format!("Parsing failed: {err}"))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
