use itertools::Itertools;

use crate::squash_asserts::squash_assert_simple;
use crate::task::VariableId;

/// A pattern: the subset of task variables a projection keeps.
///
/// Patterns are canonically stored sorted ascending and are always non-empty. Within a pattern
/// collection, every variable occurs in at most one live pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    variables: Vec<VariableId>,
}

impl Pattern {
    pub fn singleton(variable: VariableId) -> Self {
        Pattern {
            variables: vec![variable],
        }
    }

    pub fn from_variables(mut variables: Vec<VariableId>) -> Self {
        variables.sort();
        squash_assert_simple!(
            !variables.is_empty(),
            "a pattern has to contain at least one variable"
        );
        squash_assert_simple!(
            variables
                .windows(2)
                .all(|pair| pair[0] < pair[1]),
            "a pattern may not contain duplicate variables"
        );
        Pattern { variables }
    }

    /// Returns a new pattern which additionally contains `variable`. The variable must not
    /// already be part of the pattern.
    pub fn extended_with(&self, variable: VariableId) -> Self {
        squash_assert_simple!(
            !self.contains(variable),
            "cannot extend a pattern by a variable it already contains"
        );
        let mut variables = self.variables.clone();
        variables.push(variable);
        Pattern::from_variables(variables)
    }

    /// Returns the union of two disjoint patterns.
    pub fn union(&self, other: &Pattern) -> Self {
        let mut variables = self.variables.clone();
        variables.extend_from_slice(&other.variables);
        Pattern::from_variables(variables)
    }

    pub fn contains(&self, variable: VariableId) -> bool {
        self.variables.binary_search(&variable).is_ok()
    }

    /// The position of `variable` within the sorted pattern, if it is contained.
    pub(crate) fn position_of(&self, variable: VariableId) -> Option<usize> {
        self.variables.binary_search(&variable).ok()
    }

    pub fn variables(&self) -> &[VariableId] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variables.iter().copied()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.variables.iter().join(", "))
    }
}
