use std::time::Instant;

use clap::ValueEnum;
use itertools::Itertools;
use log::debug;
use log::info;

use crate::basic_types::Flaw;
use crate::basic_types::PatternGenerationError;
use crate::basic_types::Random;
use crate::containers::TypedIndex;
use crate::pdbs::collection::SolutionCollection;
use crate::pdbs::PatternCollection;
use crate::squash_asserts::squash_assert_ne_simple;
use crate::squash_asserts::squash_assert_simple;
use crate::task::PlanningTask;
use crate::task::VariableId;
use crate::termination::TerminationCondition;

/// How the initial pattern collection is seeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum InitialCollectionType {
    /// A single pattern containing the goal variable provided through
    /// [`CegarOptions::given_goal`].
    GivenGoal,
    /// A single pattern containing one goal variable drawn at random.
    RandomGoal,
    /// One singleton pattern per goal variable.
    #[default]
    AllGoals,
}

/// The configuration of a [`CegarGenerator`].
#[derive(Clone, Copy, Debug)]
pub struct CegarOptions {
    /// Hard cap on the number of refinement steps; [`usize::MAX`] means unbounded.
    pub max_refinements: usize,
    /// Cap on the size of a single pattern database. The initial seed is exempt so that the
    /// collection is never empty.
    pub max_pdb_size: usize,
    /// Cap on the summed sizes of all pattern databases; [`usize::MAX`] means unbounded. The
    /// initial seed is exempt.
    pub max_collection_size: usize,
    /// Whether plan steps keep the whole equivalence class of interchangeable operators instead
    /// of a single representative.
    pub wildcard_plans: bool,
    /// When true, a plan which executes but misses the goal marks its entry as solved instead of
    /// raising goal violation flaws; only a single pattern is ever produced.
    pub ignore_goal_violations: bool,
    /// Number of randomly drawn non-goal variables which are ignored during plan replay.
    pub blacklist_size: usize,
    pub initial_collection: InitialCollectionType,
    /// The seed variable for [`InitialCollectionType::GivenGoal`].
    pub given_goal: Option<VariableId>,
}

impl Default for CegarOptions {
    fn default() -> Self {
        CegarOptions {
            max_refinements: usize::MAX,
            max_pdb_size: 1_000_000,
            max_collection_size: usize::MAX,
            wildcard_plans: true,
            ignore_goal_violations: false,
            blacklist_size: 0,
            initial_collection: InitialCollectionType::AllGoals,
            given_goal: None,
        }
    }
}

/// Generates a pattern collection by counterexample-guided abstraction refinement.
///
/// The generator seeds a collection of singleton goal patterns and then repeatedly replays the
/// entries' abstract plans on the concrete task. Every replay failure is blamed on a variable the
/// abstraction ignores (a *flaw*); one flaw is drawn uniformly and repaired by merging two
/// patterns, extending a pattern by the variable, or blacklisting the variable when the size
/// limits allow neither. The loop stops when no actionable flaw remains, some abstract plan
/// solves the concrete task outright, or the refinement or time budget runs out.
///
/// The whole run is deterministic in (task, random generator seed, options).
#[derive(Debug)]
pub struct CegarGenerator<'a, Rng> {
    task: &'a PlanningTask,
    options: CegarOptions,
    rng: &'a mut Rng,
    collection: SolutionCollection,
}

impl<'a, Rng: Random> CegarGenerator<'a, Rng> {
    pub fn new(task: &'a PlanningTask, options: CegarOptions, rng: &'a mut Rng) -> Self {
        let collection =
            SolutionCollection::new(options.max_pdb_size, options.max_collection_size);
        CegarGenerator {
            task,
            options,
            rng,
            collection,
        }
    }

    /// Runs the refinement loop to completion and returns the final collection.
    ///
    /// `termination` is polled cooperatively between operations; a single pattern database
    /// construction or plan replay may overrun the remaining budget.
    pub fn generate(
        mut self,
        termination: &mut impl TerminationCondition,
    ) -> Result<PatternCollection, PatternGenerationError> {
        let start_time = Instant::now();

        self.prepare_goals_and_blacklist()?;
        self.seed_collection();

        let mut refinement_counter = 0;
        loop {
            if self.termination_conditions_met(termination, refinement_counter) {
                break;
            }

            let flaws = self.collect_flaws()?;
            if flaws.is_empty() {
                if let Some(index) = self.collection.concrete_solution_index() {
                    let solution = self
                        .collection
                        .entry(index)
                        .expect("the concrete solution references a live entry");
                    info!("task solved during computation of abstract solutions");
                    solution.log_plan(self.task);
                    info!("length of plan: {} step(s)", solution.plan().len());
                    info!("cost of plan: {}", solution.plan_cost(self.task));
                } else {
                    info!("flaw list empty; no further refinements possible");
                }
                break;
            }

            if termination.should_stop() {
                info!("time limit reached");
                break;
            }

            self.refine(&flaws);
            refinement_counter += 1;
            debug!(
                "current collection size: {}",
                self.collection.collection_size()
            );
            debug!("current collection: {}", self.format_collection());
        }

        info!(
            "pattern collection generation took {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
        info!("number of refinements: {refinement_counter}");
        info!("final collection: {}", self.format_collection());
        info!(
            "final collection summed PDB sizes: {}",
            self.collection.collection_size()
        );

        Ok(self.collection.into_pattern_collection())
    }

    fn termination_conditions_met(
        &self,
        termination: &mut impl TerminationCondition,
        refinement_counter: usize,
    ) -> bool {
        if termination.should_stop() {
            info!("time limit reached");
            return true;
        }
        if refinement_counter >= self.options.max_refinements {
            info!("maximum allowed number of refinements reached");
            return true;
        }
        false
    }

    /// Collects the goal variables in shuffled order and draws the requested number of non-goal
    /// variables into the blacklist. Fails when a given seed goal is invalid.
    fn prepare_goals_and_blacklist(&mut self) -> Result<(), PatternGenerationError> {
        if self.options.initial_collection == InitialCollectionType::GivenGoal {
            let given_goal = self
                .options
                .given_goal
                .ok_or(PatternGenerationError::MissingGivenGoal)?;
            if given_goal.index() >= self.task.num_variables() {
                return Err(PatternGenerationError::GoalVariableOutOfRange(
                    given_goal.index(),
                ));
            }
            if !self.task.is_goal_variable(given_goal) {
                return Err(PatternGenerationError::NotAGoalVariable(given_goal.index()));
            }
        }

        let mut goal_variables: Vec<VariableId> =
            self.task.goals().iter().map(|goal| goal.variable).collect();
        self.rng.shuffle(&mut goal_variables);

        if self.options.blacklist_size > 0 {
            let mut non_goals: Vec<VariableId> = self
                .task
                .variables()
                .filter(|&variable| !self.task.is_goal_variable(variable))
                .collect();
            self.rng.shuffle(&mut non_goals);
            for &variable in non_goals.iter().take(self.options.blacklist_size) {
                debug!("blacklisting {variable}");
                self.collection.add_to_blacklist(variable);
            }
        }

        self.collection.set_remaining_goals(goal_variables);
        Ok(())
    }

    fn seed_collection(&mut self) {
        squash_assert_simple!(
            !self.collection.remaining_goals().is_empty(),
            "a planning task has at least one goal"
        );
        match self.options.initial_collection {
            InitialCollectionType::GivenGoal => {
                let given_goal = self
                    .options
                    .given_goal
                    .expect("validated during preparation");
                self.add_singleton(given_goal);
            }
            InitialCollectionType::RandomGoal => {
                let variable = self
                    .collection
                    .pop_remaining_goal()
                    .expect("a planning task has at least one goal");
                self.add_singleton(variable);
            }
            InitialCollectionType::AllGoals => {
                while let Some(variable) = self.collection.pop_remaining_goal() {
                    self.add_singleton(variable);
                }
            }
        }
        debug!("initial collection: {}", self.format_collection());
    }

    fn add_singleton(&mut self, variable: VariableId) {
        self.collection.add_singleton_pattern(
            self.task,
            self.rng,
            self.options.wildcard_plans,
            variable,
        );
    }

    /// Replays every unsolved entry's plan, concatenating the per-entry flaw lists. Detecting a
    /// concrete solution discards all flaws; an entry without an abstract solution proves the
    /// task unsolvable.
    fn collect_flaws(&mut self) -> Result<Vec<Flaw>, PatternGenerationError> {
        let mut flaws = Vec::new();
        for index in 0..self.collection.num_slots() {
            let Some(solution) = self.collection.entry(index) else {
                continue;
            };
            if solution.is_solved() {
                continue;
            }
            if !solution.solution_exists() {
                info!(
                    "the projection to pattern {} admits no abstract plan; the task is unsolvable",
                    solution.pattern()
                );
                return Err(PatternGenerationError::UnsolvableTask);
            }

            let new_flaws = self.simulate_plan(index);
            if self.collection.concrete_solution_index().is_some() {
                squash_assert_simple!(self.collection.concrete_solution_index() == Some(index));
                squash_assert_simple!(new_flaws.is_empty());
                return Ok(Vec::new());
            }
            flaws.extend(new_flaws);
        }
        Ok(flaws)
    }

    /// Replays the plan of the entry at `solution_index` on the concrete task, starting from the
    /// concrete initial state.
    ///
    /// Per plan step, each member of the equivalence class is tried in order: the first member
    /// whose non-blacklisted preconditions all hold is applied and the flaws recorded for the
    /// step are discarded. If no member applies, the recorded flaws are returned and the plan is
    /// abandoned.
    ///
    /// A plan which completes in a concrete goal state while the blacklist is empty solves the
    /// concrete task. With a non-empty blacklist the replay may have glossed over blacklisted
    /// preconditions, so the entry is only marked solved, without any guarantee for the concrete
    /// task. A completed plan which misses the goal raises one flaw per unsatisfied,
    /// non-blacklisted goal variable that is still available; goal variables already placed in
    /// some pattern are projection-tracked and would have surfaced as precondition flaws instead.
    fn simulate_plan(&mut self, solution_index: usize) -> Vec<Flaw> {
        let solution = self
            .collection
            .entry(solution_index)
            .expect("only live entries are simulated");
        let pattern = solution.pattern().clone();
        let mut flaws = Vec::new();
        let mut current = self.task.initial_state().clone();

        for step in solution.plan() {
            let mut step_failed = true;
            for &abstract_op in step {
                let operator = self
                    .task
                    .operator(solution.concrete_operator_id(abstract_op));

                // Checking applicability by hand gives direct access to the precondition which
                // blocks the operator.
                let mut flaw_detected = false;
                for precondition in operator.preconditions() {
                    if self.collection.is_blacklisted(precondition.variable) {
                        continue;
                    }
                    if current[precondition.variable] != precondition.value {
                        flaw_detected = true;
                        flaws.push(Flaw {
                            solution_index,
                            variable: precondition.variable,
                        });
                    }
                }

                if !flaw_detected {
                    step_failed = false;
                    flaws.clear();
                    current = current.successor(operator);
                    break;
                }
            }

            if step_failed {
                break;
            }
        }

        if !flaws.is_empty() {
            debug!("plan of pattern {pattern} failed");
            return flaws;
        }

        debug!("plan of pattern {pattern} successfully executed");
        if self.task.is_goal_state(&current) {
            if self.collection.blacklist_is_empty() {
                debug!("the replay reached a concrete goal state; the concrete task is solved");
                self.collection.set_concrete_solution_index(solution_index);
            } else {
                debug!(
                    "the replay reached a concrete goal state, but blacklisted variables were \
                     ignored; marking the entry as solved"
                );
                self.mark_solved(solution_index);
            }
        } else if self.options.ignore_goal_violations {
            debug!("goal violations are ignored; marking the entry as solved");
            self.mark_solved(solution_index);
        } else {
            debug!("the replay did not reach a goal state; raising goal violation flaws");
            for goal in self.task.goals() {
                if current[goal.variable] != goal.value
                    && !self.collection.is_blacklisted(goal.variable)
                    && self.collection.is_remaining_goal(goal.variable)
                {
                    flaws.push(Flaw {
                        solution_index,
                        variable: goal.variable,
                    });
                }
            }
        }
        flaws
    }

    fn mark_solved(&mut self, solution_index: usize) {
        self.collection
            .entry_mut(solution_index)
            .expect("only live entries are marked solved")
            .mark_solved();
    }

    /// Draws one flaw uniformly at random and repairs it.
    fn refine(&mut self, flaws: &[Flaw]) {
        squash_assert_simple!(!flaws.is_empty());
        let flaw = flaws[self.rng.generate_usize_in_range(0..flaws.len())];
        debug!(
            "chosen flaw: pattern {} with a flaw on {}",
            self.collection
                .entry(flaw.solution_index)
                .expect("flaws reference live entries")
                .pattern(),
            flaw.variable
        );
        self.resolve_flaw(flaw);
    }

    /// Repairs a flaw by merging, extending, or (when the size limits allow neither)
    /// blacklisting.
    ///
    /// A flawed goal variable which is not yet in the collection extends the pattern that caused
    /// the flaw rather than opening a new singleton pattern.
    fn resolve_flaw(&mut self, flaw: Flaw) {
        let Flaw {
            solution_index,
            variable,
        } = flaw;

        if let Some(other_index) = self.collection.lookup(variable) {
            squash_assert_ne_simple!(other_index, solution_index);
            debug!(
                "{variable} is already in pattern {}",
                self.collection
                    .entry(other_index)
                    .expect("the lookup references live entries")
                    .pattern()
            );
            if self.collection.can_merge_patterns(solution_index, other_index) {
                debug!("merging the two patterns");
                self.collection.merge_patterns(
                    self.task,
                    self.rng,
                    self.options.wildcard_plans,
                    solution_index,
                    other_index,
                );
                return;
            }
        } else {
            debug!("{variable} is not in the collection yet");
            if self
                .collection
                .can_extend_pattern(self.task, solution_index, variable)
            {
                debug!("adding it to the pattern");
                self.collection.extend_pattern(
                    self.task,
                    self.rng,
                    self.options.wildcard_plans,
                    solution_index,
                    variable,
                );
                return;
            }
        }

        debug!("the size limits allow neither merging nor extending; blacklisting {variable}");
        self.collection.add_to_blacklist(variable);
    }

    fn format_collection(&self) -> String {
        format!(
            "[{}]",
            self.collection
                .live_entries()
                .map(|(_, solution)| solution.pattern().to_string())
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::random::tests::TestRandom;
    use crate::task::FactPair;
    use crate::task::Operator;
    use crate::termination::Indefinite;

    fn fact(variable: u32, value: u32) -> FactPair {
        FactPair::new(VariableId::new(variable), value)
    }

    /// Goal on variable 0; the only operator achieving it requires variable 1, which nothing
    /// achieves.
    fn blocked_task() -> PlanningTask {
        PlanningTask::new(
            vec![2, 2],
            vec![0, 0],
            vec![fact(0, 1)],
            vec![Operator::new("reach", vec![fact(1, 1)], vec![fact(0, 1)], 1)],
        )
    }

    /// Goals on variables 0 and 1; achieving the goal of variable 0 requires variable 1 first.
    fn two_goal_task() -> PlanningTask {
        PlanningTask::new(
            vec![2, 2],
            vec![0, 0],
            vec![fact(0, 1), fact(1, 1)],
            vec![
                Operator::new("finish", vec![fact(1, 1)], vec![fact(0, 1)], 1),
                Operator::new("prepare", vec![], vec![fact(1, 1)], 1),
            ],
        )
    }

    #[test]
    fn precondition_flaw_extends_the_flawed_pattern() {
        let task = blocked_task();
        let mut rng = TestRandom { usizes: vec![0] };
        let options = CegarOptions {
            initial_collection: InitialCollectionType::GivenGoal,
            given_goal: Some(VariableId::new(0)),
            ..Default::default()
        };
        let mut generator = CegarGenerator::new(&task, options, &mut rng);
        generator.prepare_goals_and_blacklist().unwrap();
        generator.seed_collection();

        let flaws = generator.collect_flaws().unwrap();
        assert_eq!(
            flaws,
            vec![Flaw {
                solution_index: 0,
                variable: VariableId::new(1)
            }]
        );

        generator.refine(&flaws);
        let entry = generator.collection.entry(0).unwrap();
        assert_eq!(
            entry.pattern().variables(),
            &[VariableId::new(0), VariableId::new(1)]
        );
        assert_eq!(generator.collection.lookup(VariableId::new(1)), Some(0));

        // The extended projection shows the goal of variable 0 to be unreachable.
        assert_eq!(
            generator.collect_flaws(),
            Err(PatternGenerationError::UnsolvableTask)
        );
    }

    #[test]
    fn flaw_on_a_covered_variable_merges_the_two_patterns() {
        let task = two_goal_task();
        // one draw for the goal shuffle, one for the uniform flaw pick
        let mut rng = TestRandom { usizes: vec![0, 0] };
        let mut generator = CegarGenerator::new(&task, CegarOptions::default(), &mut rng);
        generator.prepare_goals_and_blacklist().unwrap();
        generator.seed_collection();
        assert_eq!(generator.collection.live_entries().count(), 2);

        let flaws = generator.collect_flaws().unwrap();
        assert_eq!(flaws.len(), 1);
        assert_eq!(flaws[0].variable, VariableId::new(1));

        generator.refine(&flaws);
        assert_eq!(generator.collection.live_entries().count(), 1);
        assert_eq!(generator.collection.collection_size(), 4);
        assert!(generator.collection.invariants_hold());
        let (_, merged) = generator.collection.live_entries().next().unwrap();
        assert_eq!(
            merged.pattern().variables(),
            &[VariableId::new(0), VariableId::new(1)]
        );
    }

    #[test]
    fn size_limits_push_the_flawed_variable_onto_the_blacklist() {
        let task = two_goal_task();
        let mut rng = TestRandom { usizes: vec![0, 0] };
        let options = CegarOptions {
            max_pdb_size: 2,
            ..Default::default()
        };
        let mut generator = CegarGenerator::new(&task, options, &mut rng);
        generator.prepare_goals_and_blacklist().unwrap();
        generator.seed_collection();

        let flaws = generator.collect_flaws().unwrap();
        generator.refine(&flaws);
        assert!(generator.collection.is_blacklisted(VariableId::new(1)));
        assert_eq!(generator.collection.live_entries().count(), 2);

        // Blacklisted variables no longer produce flaws, so refinement has converged.
        assert_eq!(generator.collect_flaws().unwrap(), vec![]);
    }

    #[test]
    fn seeding_from_an_out_of_range_goal_fails() {
        let task = blocked_task();
        let mut rng = TestRandom { usizes: vec![] };
        let options = CegarOptions {
            initial_collection: InitialCollectionType::GivenGoal,
            given_goal: Some(VariableId::new(7)),
            ..Default::default()
        };
        let result = CegarGenerator::new(&task, options, &mut rng).generate(&mut Indefinite);
        assert_eq!(result.unwrap_err(), PatternGenerationError::GoalVariableOutOfRange(7));
    }

    #[test]
    fn seeding_from_a_non_goal_variable_fails() {
        let task = blocked_task();
        let mut rng = TestRandom { usizes: vec![] };
        let options = CegarOptions {
            initial_collection: InitialCollectionType::GivenGoal,
            given_goal: Some(VariableId::new(1)),
            ..Default::default()
        };
        let result = CegarGenerator::new(&task, options, &mut rng).generate(&mut Indefinite);
        assert_eq!(result.unwrap_err(), PatternGenerationError::NotAGoalVariable(1));
    }

    #[test]
    fn seeding_from_a_given_goal_requires_one() {
        let task = blocked_task();
        let mut rng = TestRandom { usizes: vec![] };
        let options = CegarOptions {
            initial_collection: InitialCollectionType::GivenGoal,
            ..Default::default()
        };
        let result = CegarGenerator::new(&task, options, &mut rng).generate(&mut Indefinite);
        assert_eq!(result.unwrap_err(), PatternGenerationError::MissingGivenGoal);
    }
}
