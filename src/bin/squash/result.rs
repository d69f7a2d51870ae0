use squash::PatternGenerationError;
use thiserror::Error;

use crate::sas_parser::SasParseError;

pub(crate) type SquashResult<T> = Result<T, SquashError>;

#[derive(Error, Debug)]
pub(crate) enum SquashError {
    #[error("failed to read {1}: {0}")]
    FileReadingError(std::io::Error, String),
    #[error("failed to parse the instance: {0}")]
    ParseError(#[from] SasParseError),
    #[error(transparent)]
    GenerationError(#[from] PatternGenerationError),
}

impl SquashError {
    /// The process exit code reported for the error: 20 when the task was proven unsolvable, 2
    /// for every rejected input (unreadable or malformed instance, invalid seed goal).
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            SquashError::GenerationError(PatternGenerationError::UnsolvableTask) => 20,
            _ => 2,
        }
    }
}
