//! Error type shared by the assembly pipeline.

use crate::read_source::ReadSourceError;

/// Failures raised before or during graph construction.
///
/// Traversal and statistics are total over a well-formed graph, so every
/// variant here originates from configuration checks or from the read source.
#[derive(thiserror::Error, Debug)]
pub enum AssemblyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Read source error: {0}")]
    ReadSource(#[from] ReadSourceError),
}

pub type Result<T> = std::result::Result<T, AssemblyError>;
