use std::collections::HashMap;
use std::collections::HashSet;

use crate::basic_types::Random;
use crate::math::is_product_within_limit;
use crate::pdbs::pattern_solution::PatternSolution;
use crate::pdbs::Pattern;
use crate::pdbs::PatternCollection;
use crate::squash_asserts::squash_assert_extreme;
use crate::squash_asserts::squash_assert_ne_simple;
use crate::squash_asserts::squash_assert_simple;
use crate::task::PlanningTask;
use crate::task::VariableId;

/// The set of live [`PatternSolution`]s under refinement, together with the bookkeeping the
/// refinement operators rely on.
///
/// Entries are replaced rather than mutated: extending or merging installs a freshly constructed
/// solution. A merged-away slot is tombstoned (`None`) instead of removed, so entry indices stay
/// stable for the whole run.
#[derive(Debug)]
pub(crate) struct SolutionCollection {
    entries: Vec<Option<PatternSolution>>,
    /// Maps a variable to the index of the live entry whose pattern contains it. Used for
    /// checking whether a variable is already part of the collection as well as for quickly
    /// finding the partner entry when merging.
    variable_lookup: HashMap<VariableId, usize>,
    /// Sum of the PDB sizes of all live entries.
    collection_size: usize,
    /// Goal variables which are not yet part of any pattern, in shuffled order.
    remaining_goals: Vec<VariableId>,
    /// Variables whose precondition and goal violations are ignored during plan replay.
    blacklist: HashSet<VariableId>,
    /// Index of an entry whose abstract plan turned out to solve the concrete task, if any.
    concrete_solution_index: Option<usize>,
    max_pdb_size: usize,
    max_collection_size: usize,
}

impl SolutionCollection {
    pub(crate) fn new(max_pdb_size: usize, max_collection_size: usize) -> Self {
        SolutionCollection {
            entries: Vec::new(),
            variable_lookup: HashMap::new(),
            collection_size: 0,
            remaining_goals: Vec::new(),
            blacklist: HashSet::new(),
            concrete_solution_index: None,
            max_pdb_size,
            max_collection_size,
        }
    }

    pub(crate) fn set_remaining_goals(&mut self, goals: Vec<VariableId>) {
        self.remaining_goals = goals;
    }

    pub(crate) fn remaining_goals(&self) -> &[VariableId] {
        &self.remaining_goals
    }

    pub(crate) fn pop_remaining_goal(&mut self) -> Option<VariableId> {
        self.remaining_goals.pop()
    }

    pub(crate) fn is_remaining_goal(&self, variable: VariableId) -> bool {
        self.remaining_goals.contains(&variable)
    }

    /// Removes `variable` from the remaining goals if it is contained there. Only called for
    /// variables which are definitely part of some pattern afterwards.
    fn mark_goal_covered(&mut self, variable: VariableId) {
        if let Some(position) = self
            .remaining_goals
            .iter()
            .position(|&goal| goal == variable)
        {
            let _ = self.remaining_goals.remove(position);
        }
    }

    /// Creates a new entry for the pattern `{variable}` and appends it to the collection. Size
    /// limits are deliberately not consulted here: seeding may over-allocate so that the
    /// collection is never empty.
    pub(crate) fn add_singleton_pattern(
        &mut self,
        task: &PlanningTask,
        rng: &mut impl Random,
        wildcard_plans: bool,
        variable: VariableId,
    ) {
        let solution = PatternSolution::new(task, Pattern::singleton(variable), rng, wildcard_plans);
        self.collection_size += solution.pdb().size();
        self.entries.push(Some(solution));
        let _ = self.variable_lookup.insert(variable, self.entries.len() - 1);
        self.mark_goal_covered(variable);
        squash_assert_extreme!(self.invariants_hold());
    }

    /// Whether the entry at `index` may grow by `variable` without breaking the per-PDB limit or
    /// the collection limit.
    pub(crate) fn can_extend_pattern(
        &self,
        task: &PlanningTask,
        index: usize,
        variable: VariableId,
    ) -> bool {
        let pdb_size = self.entry_size(index);
        let domain_size = task.domain_size(variable);
        if !is_product_within_limit(pdb_size, domain_size, self.max_pdb_size) {
            return false;
        }
        let added_size = pdb_size * (domain_size - 1);
        self.collection_size
            .checked_add(added_size)
            .is_some_and(|total| total <= self.max_collection_size)
    }

    /// Replaces the entry at `index` by a freshly constructed entry for its pattern extended by
    /// `variable`.
    pub(crate) fn extend_pattern(
        &mut self,
        task: &PlanningTask,
        rng: &mut impl Random,
        wildcard_plans: bool,
        index: usize,
        variable: VariableId,
    ) {
        let old = self.entries[index]
            .as_ref()
            .expect("only live entries are extended");
        let new_pattern = old.pattern().extended_with(variable);
        let old_size = old.pdb().size();

        let solution = PatternSolution::new(task, new_pattern, rng, wildcard_plans);
        self.collection_size -= old_size;
        self.collection_size += solution.pdb().size();
        self.entries[index] = Some(solution);
        let _ = self.variable_lookup.insert(variable, index);
        self.mark_goal_covered(variable);
        squash_assert_extreme!(self.invariants_hold());
    }

    /// Whether the entries at `index1` and `index2` may be merged without breaking the per-PDB
    /// limit or the collection limit.
    pub(crate) fn can_merge_patterns(&self, index1: usize, index2: usize) -> bool {
        let pdb_size1 = self.entry_size(index1);
        let pdb_size2 = self.entry_size(index2);
        if !is_product_within_limit(pdb_size1, pdb_size2, self.max_pdb_size) {
            return false;
        }
        // The merged database replaces the two originals, so the size delta
        // `pdb_size1 * pdb_size2 - pdb_size1 - pdb_size2` can be negative (a database over a
        // single domain-size-1 variable has size 1). The subtracted terms are moved to the limit
        // side of the comparison, widened so neither side can overflow.
        self.collection_size as u128 + (pdb_size1 * pdb_size2) as u128
            <= self.max_collection_size as u128 + pdb_size1 as u128 + pdb_size2 as u128
    }

    /// Merges the entry at `index2` into the entry at `index1`, tombstoning the slot at `index2`.
    pub(crate) fn merge_patterns(
        &mut self,
        task: &PlanningTask,
        rng: &mut impl Random,
        wildcard_plans: bool,
        index1: usize,
        index2: usize,
    ) {
        squash_assert_ne_simple!(index1, index2);
        let solution1 = self.entries[index1]
            .as_ref()
            .expect("only live entries are merged");
        let solution2 = self.entries[index2]
            .as_ref()
            .expect("only live entries are merged");

        let new_pattern = solution1.pattern().union(solution2.pattern());
        let pdb_size1 = solution1.pdb().size();
        let pdb_size2 = solution2.pdb().size();

        // The variables of the dissolved entry are looked up through the merged one from now on.
        for variable in solution2.pattern().variables().to_vec() {
            let _ = self.variable_lookup.insert(variable, index1);
        }

        let merged = PatternSolution::new(task, new_pattern, rng, wildcard_plans);
        self.collection_size -= pdb_size1;
        self.collection_size -= pdb_size2;
        self.collection_size += merged.pdb().size();
        self.entries[index1] = Some(merged);
        self.entries[index2] = None;
        squash_assert_extreme!(self.invariants_hold());
    }

    pub(crate) fn add_to_blacklist(&mut self, variable: VariableId) {
        let _ = self.blacklist.insert(variable);
    }

    pub(crate) fn is_blacklisted(&self, variable: VariableId) -> bool {
        self.blacklist.contains(&variable)
    }

    pub(crate) fn blacklist_is_empty(&self) -> bool {
        self.blacklist.is_empty()
    }

    /// The index of the live entry whose pattern contains `variable`, if any.
    pub(crate) fn lookup(&self, variable: VariableId) -> Option<usize> {
        self.variable_lookup.get(&variable).copied()
    }

    pub(crate) fn num_slots(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&PatternSolution> {
        self.entries[index].as_ref()
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut PatternSolution> {
        self.entries[index].as_mut()
    }

    pub(crate) fn live_entries(&self) -> impl Iterator<Item = (usize, &PatternSolution)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().map(|solution| (index, solution)))
    }

    pub(crate) fn collection_size(&self) -> usize {
        self.collection_size
    }

    pub(crate) fn concrete_solution_index(&self) -> Option<usize> {
        self.concrete_solution_index
    }

    pub(crate) fn set_concrete_solution_index(&mut self, index: usize) {
        squash_assert_simple!(self.entries[index].is_some());
        self.concrete_solution_index = Some(index);
    }

    /// Finalizes the collection: the single entry which solved the concrete task if one exists,
    /// otherwise all live entries.
    pub(crate) fn into_pattern_collection(mut self) -> PatternCollection {
        if let Some(index) = self.concrete_solution_index {
            let solution = self.entries[index]
                .take()
                .expect("the concrete solution references a live entry");
            PatternCollection::new(vec![solution.into_pdb()])
        } else {
            PatternCollection::new(
                self.entries
                    .into_iter()
                    .flatten()
                    .map(PatternSolution::into_pdb)
                    .collect(),
            )
        }
    }

    /// Checks the bookkeeping against the live entries: the summed PDB sizes match
    /// `collection_size`, the variable lookup and the patterns agree in both directions, live
    /// patterns are pairwise disjoint, and every pattern is sorted and non-empty.
    pub(crate) fn invariants_hold(&self) -> bool {
        let summed_size: usize = self
            .live_entries()
            .map(|(_, solution)| solution.pdb().size())
            .sum();
        if summed_size != self.collection_size {
            return false;
        }

        let mut num_pattern_variables = 0;
        for (index, solution) in self.live_entries() {
            let pattern = solution.pattern();
            if pattern.is_empty()
                || !pattern.variables().windows(2).all(|pair| pair[0] < pair[1])
            {
                return false;
            }
            num_pattern_variables += pattern.len();
            if !pattern
                .iter()
                .all(|variable| self.lookup(variable) == Some(index))
            {
                return false;
            }
        }

        // Together with the per-pattern check above this makes the lookup a bijection between
        // pattern variables and their entries, so live patterns are pairwise disjoint.
        if num_pattern_variables != self.variable_lookup.len() {
            return false;
        }
        self.variable_lookup.iter().all(|(&variable, &index)| {
            self.entries[index]
                .as_ref()
                .is_some_and(|solution| solution.pattern().contains(variable))
        })
    }

    fn entry_size(&self, index: usize) -> usize {
        self.entries[index]
            .as_ref()
            .expect("size queries address live entries")
            .pdb()
            .size()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::task::FactPair;
    use crate::task::Operator;

    fn fact(variable: u32, value: u32) -> FactPair {
        FactPair::new(VariableId::new(variable), value)
    }

    /// Three variables with domains 2, 3, 4; goals on variables 0 and 1.
    fn task() -> PlanningTask {
        PlanningTask::new(
            vec![2, 3, 4],
            vec![0, 0, 0],
            vec![fact(0, 1), fact(1, 2)],
            vec![
                Operator::new("a", vec![], vec![fact(0, 1)], 1),
                Operator::new("b", vec![], vec![fact(1, 2)], 1),
            ],
        )
    }

    #[test]
    fn adding_singletons_updates_size_lookup_and_goals() {
        let task = task();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut collection = SolutionCollection::new(1_000_000, usize::MAX);
        collection.set_remaining_goals(vec![VariableId::new(0), VariableId::new(1)]);

        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(0));
        assert_eq!(collection.collection_size(), 2);
        assert_eq!(collection.lookup(VariableId::new(0)), Some(0));
        assert_eq!(collection.remaining_goals(), &[VariableId::new(1)]);
        assert!(collection.invariants_hold());
    }

    #[test]
    fn extending_adjusts_the_collection_size_by_the_difference() {
        let task = task();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut collection = SolutionCollection::new(1_000_000, usize::MAX);
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(0));

        assert!(collection.can_extend_pattern(&task, 0, VariableId::new(2)));
        collection.extend_pattern(&task, &mut rng, true, 0, VariableId::new(2));
        assert_eq!(collection.collection_size(), 8);
        assert_eq!(collection.lookup(VariableId::new(2)), Some(0));
        assert!(collection.invariants_hold());
    }

    #[test]
    fn merging_tombstones_the_second_slot() {
        let task = task();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut collection = SolutionCollection::new(1_000_000, usize::MAX);
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(0));
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(1));
        assert_eq!(collection.collection_size(), 5);

        assert!(collection.can_merge_patterns(0, 1));
        collection.merge_patterns(&task, &mut rng, true, 0, 1);
        assert_eq!(collection.collection_size(), 6);
        assert!(collection.entry(1).is_none());
        assert_eq!(collection.lookup(VariableId::new(1)), Some(0));
        assert_eq!(collection.live_entries().count(), 1);
        assert!(collection.invariants_hold());
    }

    #[test]
    fn size_limits_forbid_extending_and_merging() {
        let task = task();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut collection = SolutionCollection::new(3, usize::MAX);
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(0));
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(1));

        // 2 * 4 > 3 and 2 * 3 > 3
        assert!(!collection.can_extend_pattern(&task, 0, VariableId::new(2)));
        assert!(!collection.can_merge_patterns(0, 1));

        let mut limited = SolutionCollection::new(1_000_000, 5);
        limited.add_singleton_pattern(&task, &mut rng, true, VariableId::new(0));
        limited.add_singleton_pattern(&task, &mut rng, true, VariableId::new(1));
        // the merged PDB of size 6 would push the collection above 5
        assert!(!limited.can_merge_patterns(0, 1));
    }

    #[test]
    fn merging_with_a_trivial_database_shrinks_the_collection() {
        // Variable 0 has a single-value domain, so its database has size 1 and merging it away
        // makes the collection smaller.
        let task = PlanningTask::new(
            vec![1, 3],
            vec![0, 0],
            vec![fact(0, 0), fact(1, 2)],
            vec![Operator::new("step", vec![], vec![fact(1, 2)], 1)],
        );
        let mut rng = SmallRng::seed_from_u64(42);
        let mut collection = SolutionCollection::new(1_000_000, 3);
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(0));
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(1));
        assert_eq!(collection.collection_size(), 4);

        // 1 * 3 - 1 - 3 is a delta of -1: the merge fits even though the collection is already
        // above the limit.
        assert!(collection.can_merge_patterns(0, 1));
        collection.merge_patterns(&task, &mut rng, true, 0, 1);
        assert_eq!(collection.collection_size(), 3);
        assert!(collection.invariants_hold());
    }

    #[test]
    fn finalizing_returns_all_live_entries() {
        let task = task();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut collection = SolutionCollection::new(1_000_000, usize::MAX);
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(0));
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(1));
        collection.merge_patterns(&task, &mut rng, true, 0, 1);

        let result = collection.into_pattern_collection();
        assert_eq!(result.len(), 1);
        assert_eq!(result.pattern_databases()[0].size(), 6);
    }

    #[test]
    fn finalizing_with_a_concrete_solution_keeps_only_that_entry() {
        let task = task();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut collection = SolutionCollection::new(1_000_000, usize::MAX);
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(0));
        collection.add_singleton_pattern(&task, &mut rng, true, VariableId::new(1));
        collection.set_concrete_solution_index(1);

        let result = collection.into_pattern_collection();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.pattern_databases()[0].pattern().variables(),
            &[VariableId::new(1)]
        );
    }
}
