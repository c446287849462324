pub mod budget;
pub mod config;
pub mod core;
pub mod data;
pub mod dimacs;
pub mod heuristic;
pub mod luby;
pub mod simplify;
pub mod vec_map;

pub use self::budget::{Budget, Interrupt};
pub use self::core::{Outcome, Solver};
pub use self::data::{Clause, Literal, Unsat, Value, VarId};
pub use self::simplify::{ElimLimits, Postprocessor, Preprocessor};
