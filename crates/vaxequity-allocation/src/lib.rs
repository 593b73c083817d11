//! Equity-aware dose allocation.
//!
//! An [`AllocationProblem`] turns the country table, the network's inbound
//! capacities and need scores into a small linear program. The program is
//! solved by a [`LinearSolver`] backend (an argmin-driven simplex by default)
//! and the resulting allocation is scored with the Gini coefficient.

pub mod allocation_problem;
pub mod greedy;
pub mod linear_program;
pub mod observer;
pub mod optimization;
pub mod simplex;
pub mod types;

pub use allocation_problem::AllocationProblem;
pub use greedy::GreedySolver;
pub use linear_program::{Constraint, LinearProgram, LinearSolver, LpSolution};
pub use observer::TracingObserver;
pub use optimization::{optimize, OptimizationConfig, SimplexConfig, SimplexSolver};
pub use simplex::BoundedSimplex;
pub use types::{AllocationOutcome, AllocationResult, OptimizationReport};
