use thiserror::Error;

#[cfg(doc)]
use crate::pdbs::CegarGenerator;

/// Errors which terminate pattern collection generation by the [`CegarGenerator`].
///
/// Running out of time or refinements is not an error; in that case the generator returns the
/// collection it has built so far.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PatternGenerationError {
    /// The requested seed variable is not one of the task's variables.
    #[error("goal variable {0} is out of range of the task's variables")]
    GoalVariableOutOfRange(usize),
    /// The requested seed variable exists but does not occur in the goal.
    #[error("variable {0} is not a goal variable")]
    NotAGoalVariable(usize),
    /// Seeding from a given goal was requested without providing one.
    #[error("an initial goal variable is required when seeding the collection from a given goal")]
    MissingGivenGoal,
    /// A projection of the task admits no abstract solution. Projection only relaxes the task, so
    /// this proves the task itself unsolvable.
    #[error("a projection of the task is unsolvable, so the task itself is unsolvable")]
    UnsolvableTask,
}
