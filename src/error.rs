use std::error;
use std::fmt;

/// Errors surfaced across the crate boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A caller-supplied value is unusable: NaN position, stale entity key,
    /// wrong entity class for the operation, etc.
    InvalidArgument(String),
    /// A negative or NaN duration was passed to a time-advancing operation
    InvalidDuration(f64),
    /// A membership-protocol violation: adding an entity that overlaps a
    /// member or pokes out of the boundaries, removing a non-member
    Ownership(String),
    /// A ship program is malformed or semantically invalid (illegal
    /// statement, type mismatch, break outside of any loop)
    FalseProgram(String),
    /// A return statement executed outside a function body
    FalseReturn(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::InvalidDuration(d) => write!(f, "invalid duration: {}", d),
            Self::Ownership(msg) => write!(f, "ownership violation: {}", msg),
            Self::FalseProgram(msg) => write!(f, "program error: {}", msg),
            Self::FalseReturn(msg) => write!(f, "return error: {}", msg),
        }
    }
}

impl error::Error for Error {}
