//! Narrow linear-programming interface
//!
//! Every backend solves the same problem shape:
//!
//! ```text
//! maximize    c . x
//! subject to  A x <= b
//!             0 <= x <= u
//! ```
//!
//! `u_j` may be infinite. Backends are swappable behind [`LinearSolver`].

use argmin::core::{CostFunction, Error as ArgminError};
use serde::{Deserialize, Serialize};
use vaxequity_core::{ConstraintClass, Error, InfeasibleProblemError, SolverBackend};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub coefficients: Vec<f64>,
    pub rhs: f64,
    pub class: ConstraintClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearProgram {
    objective: Vec<f64>,
    constraints: Vec<Constraint>,
    upper_bounds: Vec<f64>,
}

impl LinearProgram {
    /// Unconstrained program over `objective.len()` non-negative variables
    pub fn new(objective: Vec<f64>) -> Self {
        let n = objective.len();
        Self {
            objective,
            constraints: Vec::new(),
            upper_bounds: vec![f64::INFINITY; n],
        }
    }

    /// Add the row `coefficients . x <= rhs`
    pub fn with_constraint(
        mut self,
        coefficients: Vec<f64>,
        rhs: f64,
        class: ConstraintClass,
    ) -> Self {
        self.constraints.push(Constraint {
            coefficients,
            rhs,
            class,
        });
        self
    }

    pub fn with_upper_bounds(mut self, upper_bounds: Vec<f64>) -> Self {
        self.upper_bounds = upper_bounds;
        self
    }

    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.objective.iter().zip(x).map(|(c, x)| c * x).sum()
    }

    /// Check the program is well-formed and that `x = 0` is feasible.
    ///
    /// Bounds and right-hand sides must be non-negative for the slack basis
    /// to be a starting vertex. A negative right-hand side on a row whose
    /// coefficients are all non-negative can never be met and is reported as
    /// infeasible; on mixed-sign rows it is a solver failure.
    pub fn check(&self) -> Result<(), Error> {
        let n = self.num_vars();
        if self.upper_bounds.len() != n {
            return Err(Error::SolverFailure(format!(
                "{} upper bounds for {n} variables",
                self.upper_bounds.len()
            )));
        }
        if self.objective.iter().any(|c| !c.is_finite()) {
            return Err(Error::SolverFailure(
                "objective has non-finite coefficients".to_string(),
            ));
        }

        for (j, &u) in self.upper_bounds.iter().enumerate() {
            if u.is_nan() || u < 0.0 {
                return Err(InfeasibleProblemError::new(
                    ConstraintClass::Row,
                    format!("variable {j} has upper bound {u}"),
                )
                .into());
            }
        }

        for (i, row) in self.constraints.iter().enumerate() {
            if row.coefficients.len() != n {
                return Err(Error::SolverFailure(format!(
                    "constraint {i} has {} coefficients for {n} variables",
                    row.coefficients.len()
                )));
            }
            if !row.rhs.is_finite() || row.coefficients.iter().any(|a| !a.is_finite()) {
                return Err(Error::SolverFailure(format!(
                    "constraint {i} has non-finite entries"
                )));
            }
            if row.rhs < 0.0 {
                if row.coefficients.iter().all(|&a| a >= 0.0) {
                    return Err(InfeasibleProblemError::new(
                        row.class,
                        format!("right-hand side {} is negative", row.rhs),
                    )
                    .into());
                }
                return Err(Error::SolverFailure(format!(
                    "constraint {i} needs a phase-one start (rhs {})",
                    row.rhs
                )));
            }
        }
        Ok(())
    }

    /// Whether `x` satisfies every constraint within `tolerance`
    pub fn is_feasible(&self, x: &[f64], tolerance: f64) -> bool {
        x.len() == self.num_vars()
            && x
                .iter()
                .zip(&self.upper_bounds)
                .all(|(&v, &u)| v >= -tolerance && v <= u + tolerance)
            && self.constraints.iter().all(|row| {
                let lhs: f64 = row.coefficients.iter().zip(x).map(|(a, v)| a * v).sum();
                lhs <= row.rhs + tolerance
            })
    }
}

/// argmin minimizes, so the cost is the negated objective
impl CostFunction for LinearProgram {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok(-self.objective_value(x))
    }
}

/// An optimal vertex
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub x: Vec<f64>,
    pub objective_value: f64,
    pub iterations: u64,
    pub status: String,
}

/// A linear-programming backend
pub trait LinearSolver {
    fn backend(&self) -> SolverBackend;

    /// # Errors
    ///
    /// `Infeasible` when no point satisfies the constraints, `SolverTimeout`
    /// or `SolverFailure` when no optimum was reached.
    fn solve(&self, program: &LinearProgram) -> Result<LpSolution, Error>;
}
