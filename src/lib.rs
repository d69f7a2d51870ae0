//! # Squash
//! Squash is a pattern database (PDB) toolkit for cost-optimal classical planning. Its core is a
//! generator of *pattern collections*: sets of projections of a planning task onto subsets of
//! its state variables, each shipped with a database of abstract goal distances. The collection
//! is built by counterexample-guided abstraction refinement (CEGAR) as introduced in \[1\]:
//! abstract plans are replayed on the concrete task, and the variables responsible for replay
//! failures decide how the collection grows.
//!
//! Pattern databases themselves go back to \[2\]; projection only relaxes the task, so the
//! stored distances are admissible heuristic estimates.
//!
//! # Example
//! A task is described by its variable domains, an initial state, a conjunctive goal, and a set
//! of operators:
//! ```rust
//! # use rand::rngs::SmallRng;
//! # use rand::SeedableRng;
//! # use squash::pdbs::CegarGenerator;
//! # use squash::pdbs::CegarOptions;
//! # use squash::task::FactPair;
//! # use squash::task::Operator;
//! # use squash::task::PlanningTask;
//! # use squash::task::VariableId;
//! # use squash::termination::Indefinite;
//! // Two binary variables: the goal requires variable 0 to reach value 1, which in turn
//! // requires variable 1 to be set first.
//! let prepare = Operator::new("prepare", vec![], vec![FactPair::new(VariableId::new(1), 1)], 1);
//! let finish = Operator::new(
//!     "finish",
//!     vec![FactPair::new(VariableId::new(1), 1)],
//!     vec![FactPair::new(VariableId::new(0), 1)],
//!     1,
//! );
//! let task = PlanningTask::new(
//!     vec![2, 2],
//!     vec![0, 0],
//!     vec![FactPair::new(VariableId::new(0), 1)],
//!     vec![prepare, finish],
//! );
//!
//! // The produced collection is deterministic in (task, seed, options).
//! let mut rng = SmallRng::seed_from_u64(42);
//! let generator = CegarGenerator::new(&task, CegarOptions::default(), &mut rng);
//! let collection = generator
//!     .generate(&mut Indefinite)
//!     .expect("the task is solvable");
//!
//! // The goal pattern was extended by the missing precondition variable.
//! assert_eq!(collection.len(), 1);
//! assert_eq!(
//!     collection.patterns().next().unwrap().variables(),
//!     &[VariableId::new(0), VariableId::new(1)]
//! );
//! ```
//!
//! # Bibliography
//! \[1\] A. Rovner, S. Sievers, and M. Helmert, ‘Counterexample-guided abstraction refinement
//! for pattern selection in optimal classical planning’, in Proceedings of the International
//! Conference on Automated Planning and Scheduling (ICAPS), 2019, pp. 362–367.
//!
//! \[2\] S. Edelkamp, ‘Planning with pattern databases’, in Proceedings of the European
//! Conference on Planning (ECP), 2001, pp. 84–90.
pub(crate) mod basic_types;
pub mod containers;
pub(crate) mod math;
pub mod pdbs;
pub(crate) mod squash_asserts;
pub mod statistics;
pub mod task;
pub mod termination;

pub use basic_types::PatternGenerationError;
pub use basic_types::Random;
