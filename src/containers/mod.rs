//! Contains containers which are used by the planning-task model and the
//! pattern database machinery.
mod indexed_vec;

pub use indexed_vec::*;
