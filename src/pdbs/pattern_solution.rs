use log::info;

use crate::basic_types::Random;
use crate::containers::IndexedVec;
use crate::pdbs::pattern_database::compute_distances;
use crate::pdbs::pattern_database::INFINITE_DISTANCE;
use crate::pdbs::projection::AbstractOperatorId;
use crate::pdbs::projection::Projection;
use crate::pdbs::Pattern;
use crate::pdbs::PatternDatabase;
use crate::task::OperatorId;
use crate::task::PlanningTask;

/// One entry of a pattern collection: a pattern together with its [`PatternDatabase`] and an
/// abstract plan which is cost-optimal for the projected task.
///
/// Every plan step is a non-empty equivalence class of abstract operators: the operators
/// applicable in the abstract state the step is taken in which reach the step's successor at the
/// same cost. With `wildcard_plans` the whole class is kept (in an order shuffled through the
/// injected random generator), otherwise a single member is drawn uniformly.
///
/// Apart from the `solved` flag an entry never changes after construction.
#[derive(Debug)]
pub(crate) struct PatternSolution {
    pdb: PatternDatabase,
    plan: Vec<Vec<AbstractOperatorId>>,
    /// Translation from the ids used within the plan back to the task's operators.
    abstract_to_concrete: IndexedVec<AbstractOperatorId, OperatorId>,
    /// False iff the projected task has no solution, which proves the concrete task unsolvable.
    solution_exists: bool,
    /// Set once the entry's plan no longer needs to be checked against the concrete task; the
    /// entry is skipped by flaw extraction from then on.
    solved: bool,
}

impl PatternSolution {
    pub(crate) fn new(
        task: &PlanningTask,
        pattern: Pattern,
        rng: &mut impl Random,
        wildcard_plans: bool,
    ) -> Self {
        let projection = Projection::new(task, pattern);
        let table = compute_distances(&projection);
        let abstract_to_concrete: IndexedVec<AbstractOperatorId, OperatorId> = projection
            .operators()
            .map(|(_, operator)| operator.concrete_id())
            .collect::<Vec<_>>()
            .into();

        let initial_rank = projection.rank_of(task.initial_state());
        let solution_exists = table.distances[initial_rank] != INFINITE_DISTANCE;

        let mut plan = Vec::new();
        if solution_exists {
            let mut current = initial_rank;
            while table.distances[current] > 0 {
                let generating_id = table.generating_operators[current]
                    .expect("every reachable non-goal abstract state has a generating operator");
                let generating = projection.operator(generating_id);
                let target = projection.successor_of(generating, current);
                let step_cost = generating.cost();

                // All operators of the same cost from `current` into `target` are
                // interchangeable: applying any of them keeps the remaining plan optimal.
                let mut step: Vec<AbstractOperatorId> = projection
                    .operators()
                    .filter(|(_, operator)| {
                        operator.cost() == step_cost
                            && projection.is_applicable(operator, current)
                            && current as i64 + operator.rank_delta() == target as i64
                    })
                    .map(|(operator_id, _)| operator_id)
                    .collect();
                if wildcard_plans {
                    rng.shuffle(&mut step);
                } else {
                    step = vec![step[rng.generate_usize_in_range(0..step.len())]];
                }
                plan.push(step);
                current = target;
            }
        }

        let pattern = projection.pattern().clone();
        PatternSolution {
            pdb: PatternDatabase::new(pattern, table.distances),
            plan,
            abstract_to_concrete,
            solution_exists,
            solved: false,
        }
    }

    pub(crate) fn pattern(&self) -> &Pattern {
        self.pdb.pattern()
    }

    pub(crate) fn pdb(&self) -> &PatternDatabase {
        &self.pdb
    }

    /// The abstract plan: a sequence of equivalence classes of abstract operator ids. Empty iff
    /// the abstract initial state already satisfies the abstract goal, or no solution exists.
    pub(crate) fn plan(&self) -> &[Vec<AbstractOperatorId>] {
        &self.plan
    }

    pub(crate) fn concrete_operator_id(&self, operator_id: AbstractOperatorId) -> OperatorId {
        self.abstract_to_concrete[operator_id]
    }

    pub(crate) fn solution_exists(&self) -> bool {
        self.solution_exists
    }

    pub(crate) fn is_solved(&self) -> bool {
        self.solved
    }

    pub(crate) fn mark_solved(&mut self) {
        self.solved = true;
    }

    /// The cost of the abstract plan on the concrete task (all members of a step share their
    /// cost, so the first member is representative).
    pub(crate) fn plan_cost(&self, task: &PlanningTask) -> u64 {
        self.plan
            .iter()
            .map(|step| task.operator(self.concrete_operator_id(step[0])).cost() as u64)
            .sum()
    }

    pub(crate) fn log_plan(&self, task: &PlanningTask) {
        for step in &self.plan {
            let operator = task.operator(self.concrete_operator_id(step[0]));
            if step.len() > 1 {
                info!("{} ({} equivalent operator(s))", operator.name(), step.len() - 1);
            } else {
                info!("{}", operator.name());
            }
        }
    }

    pub(crate) fn into_pdb(self) -> PatternDatabase {
        self.pdb
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::task::FactPair;
    use crate::task::Operator;
    use crate::task::VariableId;

    fn fact(variable: u32, value: u32) -> FactPair {
        FactPair::new(VariableId::new(variable), value)
    }

    #[test]
    fn plan_of_a_counter_projection_counts_up() {
        let increments = (0..3)
            .map(|value| {
                Operator::new(
                    format!("increment-{value}"),
                    vec![fact(0, value)],
                    vec![fact(0, value + 1)],
                    1,
                )
            })
            .collect();
        let task = PlanningTask::new(vec![4], vec![0], vec![fact(0, 3)], increments);
        let mut rng = SmallRng::seed_from_u64(42);

        let solution =
            PatternSolution::new(&task, Pattern::singleton(VariableId::new(0)), &mut rng, true);
        assert!(solution.solution_exists());
        assert_eq!(solution.plan().len(), 3);
        assert!(solution.plan().iter().all(|step| step.len() == 1));
        assert_eq!(solution.plan_cost(&task), 3);
    }

    #[test]
    fn equivalent_operators_form_one_wildcard_step() {
        // Two distinct operators inducing the same transition at the same cost.
        let task = PlanningTask::new(
            vec![2],
            vec![0],
            vec![fact(0, 1)],
            vec![
                Operator::new("first", vec![fact(0, 0)], vec![fact(0, 1)], 1),
                Operator::new("second", vec![fact(0, 0)], vec![fact(0, 1)], 1),
            ],
        );
        let mut rng = SmallRng::seed_from_u64(42);
        let wildcard =
            PatternSolution::new(&task, Pattern::singleton(VariableId::new(0)), &mut rng, true);
        assert_eq!(wildcard.plan().len(), 1);
        assert_eq!(wildcard.plan()[0].len(), 2);

        let single =
            PatternSolution::new(&task, Pattern::singleton(VariableId::new(0)), &mut rng, false);
        assert_eq!(single.plan().len(), 1);
        assert_eq!(single.plan()[0].len(), 1);
    }

    #[test]
    fn satisfied_abstract_goal_yields_the_empty_plan() {
        let task = PlanningTask::new(vec![2], vec![1], vec![fact(0, 1)], vec![]);
        let mut rng = SmallRng::seed_from_u64(42);
        let solution =
            PatternSolution::new(&task, Pattern::singleton(VariableId::new(0)), &mut rng, true);
        assert!(solution.solution_exists());
        assert!(solution.plan().is_empty());
    }

    #[test]
    fn unreachable_abstract_goal_is_reported() {
        let task = PlanningTask::new(vec![2], vec![0], vec![fact(0, 1)], vec![]);
        let mut rng = SmallRng::seed_from_u64(42);
        let solution =
            PatternSolution::new(&task, Pattern::singleton(VariableId::new(0)), &mut rng, true);
        assert!(!solution.solution_exists());
        assert!(solution.plan().is_empty());
        assert_eq!(solution.pdb().size(), 2);
    }
}
