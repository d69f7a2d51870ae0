mod flaw;
mod pattern_generation_error;
pub(crate) mod random;

pub(crate) use flaw::Flaw;
pub use pattern_generation_error::PatternGenerationError;
pub use random::Random;
