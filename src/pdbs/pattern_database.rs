use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::pdbs::projection::AbstractOperatorId;
use crate::pdbs::projection::Projection;
use crate::pdbs::Pattern;

/// Distance of abstract states from which no goal state can be reached.
pub(crate) const INFINITE_DISTANCE: u64 = u64::MAX;

/// A pattern database: the goal distance of every state of a projection, indexed by rank.
///
/// The distances are admissible estimates for the concrete task because projection only relaxes:
/// every concrete plan maps to an abstract plan of at most the same cost.
#[derive(Debug)]
pub struct PatternDatabase {
    pattern: Pattern,
    /// Goal distance per abstract state; [`INFINITE_DISTANCE`] for unreachable goals.
    distances: Vec<u64>,
}

impl PatternDatabase {
    pub(crate) fn new(pattern: Pattern, distances: Vec<u64>) -> Self {
        PatternDatabase { pattern, distances }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The number of abstract states, i.e. the product of the domain sizes of the pattern's
    /// variables.
    pub fn size(&self) -> usize {
        self.distances.len()
    }
}

/// The result of the backward exploration of a projection: goal distances plus, for every state
/// with a finite positive distance, the operator through which the state was finally improved.
/// Following generating operators from any reachable state descends to a goal state.
#[derive(Debug)]
pub(crate) struct DistanceTable {
    pub(crate) distances: Vec<u64>,
    pub(crate) generating_operators: Vec<Option<AbstractOperatorId>>,
}

/// Computes abstract goal distances with a multi-source Dijkstra search from all abstract goal
/// states, traversing the transition relation backwards.
pub(crate) fn compute_distances(projection: &Projection) -> DistanceTable {
    let num_abstract_states = projection.num_abstract_states();
    let mut distances = vec![INFINITE_DISTANCE; num_abstract_states];
    let mut generating_operators: Vec<Option<AbstractOperatorId>> = vec![None; num_abstract_states];

    let mut queue: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
    for rank in 0..num_abstract_states {
        if projection.is_goal_rank(rank) {
            distances[rank] = 0;
            queue.push(Reverse((0, rank)));
        }
    }

    while let Some(Reverse((distance, rank))) = queue.pop() {
        if distance > distances[rank] {
            // stale queue entry
            continue;
        }
        for (operator_id, operator) in projection.operators() {
            let Some(predecessor) = projection.predecessor_of(operator, rank) else {
                continue;
            };
            let candidate = distance + operator.cost() as u64;
            if candidate < distances[predecessor] {
                distances[predecessor] = candidate;
                generating_operators[predecessor] = Some(operator_id);
                queue.push(Reverse((candidate, predecessor)));
            }
        }
    }

    DistanceTable {
        distances,
        generating_operators,
    }
}
