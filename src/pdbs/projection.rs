use crate::containers::TypedIndex;
use crate::pdbs::Pattern;
use crate::squash_asserts::squash_assert_moderate;
use crate::squash_asserts::squash_assert_simple;
use crate::task::OperatorId;
use crate::task::PlanningTask;
use crate::task::State;

/// A structure which identifies an operator of a [`Projection`]. Several abstract operators may
/// originate from the same concrete operator.
#[derive(Clone, PartialEq, Eq, Copy, Hash)]
pub(crate) struct AbstractOperatorId {
    id: u32,
}

impl TypedIndex for AbstractOperatorId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn from_index(index: usize) -> Self {
        AbstractOperatorId { id: index as u32 }
    }
}

impl std::fmt::Debug for AbstractOperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "abs{}", self.id)
    }
}

/// An operator of the projected task.
///
/// Abstract operators are fully grounded on the pattern: every position the operator writes also
/// carries a precondition, so the change an application makes to a state's rank is the constant
/// [`AbstractOperator::rank_delta`].
#[derive(Clone, Debug)]
pub(crate) struct AbstractOperator {
    /// The concrete operator this abstract operator was projected from.
    concrete_id: OperatorId,
    /// (pattern position, required value) pairs, sorted by position.
    preconditions: Vec<(usize, u32)>,
    /// Offset which applying the operator adds to the rank of a state.
    rank_delta: i64,
    cost: u32,
}

impl AbstractOperator {
    pub(crate) fn concrete_id(&self) -> OperatorId {
        self.concrete_id
    }

    pub(crate) fn cost(&self) -> u32 {
        self.cost
    }

    pub(crate) fn rank_delta(&self) -> i64 {
        self.rank_delta
    }
}

/// The projection of a [`PlanningTask`] onto a [`Pattern`].
///
/// Abstract states are represented by their *rank*, a perfect hash in `[0, num_abstract_states)`:
/// the value of the variable at pattern position `i` contributes `value * hash_multipliers[i]`.
#[derive(Debug)]
pub(crate) struct Projection {
    pattern: Pattern,
    /// The domain size of the variable at every pattern position.
    domain_sizes: Vec<usize>,
    hash_multipliers: Vec<usize>,
    num_abstract_states: usize,
    operators: Vec<AbstractOperator>,
    /// (pattern position, required value) pairs of the projected goal.
    goals: Vec<(usize, u32)>,
}

impl Projection {
    pub(crate) fn new(task: &PlanningTask, pattern: Pattern) -> Self {
        let domain_sizes: Vec<usize> = pattern
            .iter()
            .map(|variable| task.domain_size(variable))
            .collect();

        let mut hash_multipliers = Vec::with_capacity(pattern.len());
        let mut num_abstract_states = 1usize;
        for &domain_size in &domain_sizes {
            hash_multipliers.push(num_abstract_states);
            num_abstract_states = num_abstract_states
                .checked_mul(domain_size)
                .expect("the number of abstract states has to fit in a usize");
        }

        let goals = task
            .goals()
            .iter()
            .filter_map(|goal| {
                pattern
                    .position_of(goal.variable)
                    .map(|position| (position, goal.value))
            })
            .collect();

        let mut projection = Projection {
            pattern,
            domain_sizes,
            hash_multipliers,
            num_abstract_states,
            operators: Vec::new(),
            goals,
        };
        for operator_id in task.operator_ids() {
            projection.project_operator(task, operator_id);
        }
        projection
    }

    /// Projects one concrete operator, appending an abstract operator per combination of values
    /// the written-but-unconstrained pattern positions can take before application. Operators
    /// without an effect on the pattern, and combinations which do not change the abstract state,
    /// are dropped.
    fn project_operator(&mut self, task: &PlanningTask, operator_id: OperatorId) {
        let operator = task.operator(operator_id);

        let effects: Vec<(usize, u32)> = operator
            .effects()
            .iter()
            .filter_map(|effect| {
                self.pattern
                    .position_of(effect.variable)
                    .map(|position| (position, effect.value))
            })
            .collect();
        if effects.is_empty() {
            return;
        }

        let fixed_preconditions: Vec<(usize, u32)> = operator
            .preconditions()
            .iter()
            .filter_map(|precondition| {
                self.pattern
                    .position_of(precondition.variable)
                    .map(|position| (position, precondition.value))
            })
            .collect();

        let has_precondition_on =
            |position: usize| fixed_preconditions.iter().any(|&(p, _)| p == position);
        let free_positions: Vec<usize> = effects
            .iter()
            .map(|&(position, _)| position)
            .filter(|&position| !has_precondition_on(position))
            .collect();

        // Odometer over the values of the free positions; a single iteration when there are none.
        let mut assignment = vec![0u32; free_positions.len()];
        loop {
            let mut preconditions = fixed_preconditions.clone();
            preconditions.extend(
                free_positions
                    .iter()
                    .zip(assignment.iter())
                    .map(|(&position, &value)| (position, value)),
            );
            preconditions.sort_by_key(|&(position, _)| position);

            let value_before = |position: usize| {
                preconditions
                    .iter()
                    .find(|&&(p, _)| p == position)
                    .map(|&(_, value)| value)
                    .expect("every effect position carries a precondition")
            };
            let rank_delta: i64 = effects
                .iter()
                .map(|&(position, value_after)| {
                    (value_after as i64 - value_before(position) as i64)
                        * self.hash_multipliers[position] as i64
                })
                .sum();

            if rank_delta != 0 {
                self.operators.push(AbstractOperator {
                    concrete_id: operator_id,
                    preconditions,
                    rank_delta,
                    cost: operator.cost(),
                });
            }

            let mut digit = 0;
            loop {
                if digit == free_positions.len() {
                    return;
                }
                assignment[digit] += 1;
                if (assignment[digit] as usize) < self.domain_sizes[free_positions[digit]] {
                    break;
                }
                assignment[digit] = 0;
                digit += 1;
            }
        }
    }

    pub(crate) fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub(crate) fn num_abstract_states(&self) -> usize {
        self.num_abstract_states
    }

    pub(crate) fn operators(
        &self,
    ) -> impl Iterator<Item = (AbstractOperatorId, &AbstractOperator)> {
        self.operators
            .iter()
            .enumerate()
            .map(|(index, operator)| (AbstractOperatorId::from_index(index), operator))
    }

    pub(crate) fn operator(&self, operator_id: AbstractOperatorId) -> &AbstractOperator {
        &self.operators[operator_id.index()]
    }

    /// The rank of the projection of a concrete state.
    pub(crate) fn rank_of(&self, state: &State) -> usize {
        self.pattern
            .iter()
            .enumerate()
            .map(|(position, variable)| state[variable] as usize * self.hash_multipliers[position])
            .sum()
    }

    /// The value of the variable at `position` within the abstract state `rank`.
    fn value_at(&self, rank: usize, position: usize) -> u32 {
        (rank / self.hash_multipliers[position] % self.domain_sizes[position]) as u32
    }

    pub(crate) fn is_applicable(&self, operator: &AbstractOperator, rank: usize) -> bool {
        operator
            .preconditions
            .iter()
            .all(|&(position, value)| self.value_at(rank, position) == value)
    }

    /// The rank reached by applying `operator` in the abstract state `rank`; the operator must be
    /// applicable.
    pub(crate) fn successor_of(&self, operator: &AbstractOperator, rank: usize) -> usize {
        squash_assert_moderate!(self.is_applicable(operator, rank));
        let successor = rank as i64 + operator.rank_delta;
        squash_assert_simple!(
            successor >= 0 && (successor as usize) < self.num_abstract_states,
            "applying an applicable abstract operator stays within the abstract state space"
        );
        successor as usize
    }

    /// The abstract state `operator` was applied in to reach `rank`, if any.
    pub(crate) fn predecessor_of(
        &self,
        operator: &AbstractOperator,
        rank: usize,
    ) -> Option<usize> {
        let predecessor = rank as i64 - operator.rank_delta;
        if predecessor < 0 || predecessor as usize >= self.num_abstract_states {
            return None;
        }
        let predecessor = predecessor as usize;
        self.is_applicable(operator, predecessor)
            .then_some(predecessor)
    }

    pub(crate) fn is_goal_rank(&self, rank: usize) -> bool {
        self.goals
            .iter()
            .all(|&(position, value)| self.value_at(rank, position) == value)
    }
}
