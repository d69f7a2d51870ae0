use crate::task::VariableId;

/// Records why the abstract plan of one collection entry could not be replayed on the concrete
/// task: `variable` either carried an unsatisfied precondition at some plan step, or was an
/// unsatisfied goal after the full plan had been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Flaw {
    /// Index of the entry whose plan failed.
    pub(crate) solution_index: usize,
    /// The variable responsible for the failure.
    pub(crate) variable: VariableId,
}
