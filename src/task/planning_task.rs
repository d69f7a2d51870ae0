use crate::containers::IndexedVec;
use crate::containers::TypedIndex;
use crate::squash_asserts::squash_assert_eq_simple;
use crate::squash_asserts::squash_assert_simple;
use crate::task::State;

/// A structure which identifies a state variable of a [`PlanningTask`].
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct VariableId {
    id: u32,
}

impl VariableId {
    pub fn new(id: u32) -> Self {
        VariableId { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl TypedIndex for VariableId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn from_index(index: usize) -> Self {
        VariableId { id: index as u32 }
    }
}

impl std::fmt::Display for VariableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "var{}", self.id)
    }
}

impl std::fmt::Debug for VariableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "var{}", self.id)
    }
}

/// A structure which identifies an operator of a [`PlanningTask`].
#[derive(Clone, PartialEq, Eq, Copy, Hash)]
pub struct OperatorId {
    id: u32,
}

impl OperatorId {
    pub fn new(id: u32) -> Self {
        OperatorId { id }
    }
}

impl TypedIndex for OperatorId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn from_index(index: usize) -> Self {
        OperatorId { id: index as u32 }
    }
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op{}", self.id)
    }
}

impl std::fmt::Debug for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op{}", self.id)
    }
}

/// A variable/value pair; the building block of preconditions, effects, and goals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FactPair {
    pub variable: VariableId,
    pub value: u32,
}

impl FactPair {
    pub fn new(variable: VariableId, value: u32) -> Self {
        FactPair { variable, value }
    }
}

impl std::fmt::Display for FactPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.variable, self.value)
    }
}

/// A deterministic operator: applicable whenever all of its preconditions hold, and overwriting
/// the variables of its effects when applied.
#[derive(Clone, Debug)]
pub struct Operator {
    /// Human-readable name, used when reporting plans.
    name: String,
    /// The facts which have to hold for the operator to be applicable; sorted by variable, at
    /// most one fact per variable.
    preconditions: Vec<FactPair>,
    /// The facts the operator makes true when applied; sorted by variable, at most one fact per
    /// variable.
    effects: Vec<FactPair>,
    /// Non-negative cost of applying the operator.
    cost: u32,
}

impl Operator {
    pub fn new(
        name: impl Into<String>,
        mut preconditions: Vec<FactPair>,
        mut effects: Vec<FactPair>,
        cost: u32,
    ) -> Self {
        preconditions.sort_by_key(|fact| fact.variable);
        effects.sort_by_key(|fact| fact.variable);
        squash_assert_simple!(
            preconditions
                .windows(2)
                .all(|facts| facts[0].variable < facts[1].variable),
            "an operator may have at most one precondition per variable"
        );
        squash_assert_simple!(
            effects
                .windows(2)
                .all(|facts| facts[0].variable < facts[1].variable),
            "an operator may have at most one effect per variable"
        );

        Operator {
            name: name.into(),
            preconditions,
            effects,
            cost,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn preconditions(&self) -> &[FactPair] {
        &self.preconditions
    }

    pub fn effects(&self) -> &[FactPair] {
        &self.effects
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Returns the value the operator requires for `variable`, if any.
    pub fn precondition_on(&self, variable: VariableId) -> Option<u32> {
        self.preconditions
            .binary_search_by_key(&variable, |fact| fact.variable)
            .ok()
            .map(|position| self.preconditions[position].value)
    }
}

/// A deterministic planning task over finite-domain state variables.
///
/// The task is read-only for the whole lifetime of a pattern collection generation run; all
/// components borrow it.
#[derive(Debug)]
pub struct PlanningTask {
    /// The domain size of every variable; variable `v` takes values in `[0, domain_sizes[v])`.
    domain_sizes: IndexedVec<VariableId, usize>,
    /// The state the task starts in.
    initial_state: State,
    /// The conjunctive goal; sorted by variable, at most one fact per variable.
    goals: Vec<FactPair>,
    operators: IndexedVec<OperatorId, Operator>,
}

impl PlanningTask {
    pub fn new(
        domain_sizes: Vec<usize>,
        initial_values: Vec<u32>,
        mut goals: Vec<FactPair>,
        operators: Vec<Operator>,
    ) -> Self {
        squash_assert_eq_simple!(
            domain_sizes.len(),
            initial_values.len(),
            "the initial state has to assign a value to every variable"
        );
        squash_assert_simple!(
            domain_sizes.iter().all(|&domain_size| domain_size >= 1),
            "every variable needs a non-empty domain"
        );
        squash_assert_simple!(
            initial_values
                .iter()
                .zip(domain_sizes.iter())
                .all(|(&value, &domain_size)| (value as usize) < domain_size),
            "the initial state has to be within the variable domains"
        );

        goals.sort_by_key(|fact| fact.variable);
        squash_assert_simple!(
            goals
                .windows(2)
                .all(|facts| facts[0].variable < facts[1].variable),
            "the goal may contain at most one fact per variable"
        );

        let task = PlanningTask {
            domain_sizes: domain_sizes.into(),
            initial_state: State::new(initial_values),
            goals,
            operators: operators.into(),
        };
        squash_assert_simple!(
            task.goals
                .iter()
                .all(|goal| task.is_valid_fact(*goal)),
            "every goal fact has to be within the variable domains"
        );
        squash_assert_simple!(
            task.operators.iter().all(|operator| {
                operator
                    .preconditions()
                    .iter()
                    .chain(operator.effects())
                    .all(|fact| task.is_valid_fact(*fact))
            }),
            "every operator fact has to be within the variable domains"
        );
        task
    }

    pub fn num_variables(&self) -> usize {
        self.domain_sizes.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = VariableId> {
        self.domain_sizes.keys()
    }

    pub fn domain_size(&self, variable: VariableId) -> usize {
        self.domain_sizes[variable]
    }

    pub fn initial_state(&self) -> &State {
        &self.initial_state
    }

    /// The conjunctive goal, sorted by variable.
    pub fn goals(&self) -> &[FactPair] {
        &self.goals
    }

    pub fn is_goal_variable(&self, variable: VariableId) -> bool {
        self.goals
            .binary_search_by_key(&variable, |fact| fact.variable)
            .is_ok()
    }

    pub fn num_operators(&self) -> usize {
        self.operators.len()
    }

    pub fn operator(&self, operator_id: OperatorId) -> &Operator {
        &self.operators[operator_id]
    }

    pub fn operator_ids(&self) -> impl Iterator<Item = OperatorId> {
        self.operators.keys()
    }

    pub fn is_goal_state(&self, state: &State) -> bool {
        self.goals
            .iter()
            .all(|goal| state[goal.variable] == goal.value)
    }

    fn is_valid_fact(&self, fact: FactPair) -> bool {
        fact.variable.index() < self.num_variables()
            && (fact.value as usize) < self.domain_sizes[fact.variable]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(variable: u32, value: u32) -> FactPair {
        FactPair::new(VariableId::new(variable), value)
    }

    #[test]
    fn goal_test_checks_every_goal_fact() {
        let task = PlanningTask::new(
            vec![2, 3],
            vec![0, 0],
            vec![fact(0, 1), fact(1, 2)],
            vec![],
        );
        assert!(!task.is_goal_state(task.initial_state()));
        assert!(task.is_goal_state(&State::new(vec![1, 2])));
        assert!(!task.is_goal_state(&State::new(vec![1, 0])));
    }

    #[test]
    fn operator_facts_are_sorted_by_variable() {
        let operator = Operator::new("op", vec![fact(1, 0), fact(0, 1)], vec![fact(1, 1)], 1);
        assert_eq!(operator.preconditions(), &[fact(0, 1), fact(1, 0)]);
        assert_eq!(operator.precondition_on(VariableId::new(1)), Some(0));
        assert_eq!(operator.precondition_on(VariableId::new(2)), None);
    }

    #[test]
    fn goal_variables_are_recognised() {
        let task = PlanningTask::new(vec![2, 2, 2], vec![0, 0, 0], vec![fact(2, 1)], vec![]);
        assert!(task.is_goal_variable(VariableId::new(2)));
        assert!(!task.is_goal_variable(VariableId::new(0)));
    }
}
