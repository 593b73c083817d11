//! Bounded primal simplex as an argmin solver
//!
//! Finite upper bounds become extra `x_j <= u_j` rows, every row gets a slack
//! variable, and the all-slack basis is the starting vertex (so the program
//! must pass [`LinearProgram::check`] first). One `next_iter` performs one
//! pivot. Entering and leaving variables follow Bland's rule, which rules out
//! cycling on the degenerate vertices that zero budgets and zero capacities
//! produce.

use argmin::core::{
    ArgminError, Error, IterState, Problem, Solver, TerminationReason, TerminationStatus, KV,
};
use serde::{Deserialize, Serialize};

use crate::linear_program::LinearProgram;

pub(crate) type SimplexState = IterState<Vec<f64>, (), (), (), (), f64>;

/// Dense tableau `[A | I | b]` with the reduced-cost row stored separately
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tableau {
    rows: Vec<Vec<f64>>,
    /// Reduced costs; the last entry is the current objective value
    reduced: Vec<f64>,
    basis: Vec<usize>,
    num_vars: usize,
}

impl Tableau {
    fn from_program(lp: &LinearProgram) -> Self {
        let n = lp.num_vars();
        let bound_rows: Vec<(usize, f64)> = lp
            .upper_bounds()
            .iter()
            .enumerate()
            .filter(|(_, u)| u.is_finite())
            .map(|(j, u)| (j, *u))
            .collect();
        let m = lp.constraints().len() + bound_rows.len();
        let width = n + m + 1;

        let mut rows = Vec::with_capacity(m);
        for constraint in lp.constraints() {
            let mut row = vec![0.0; width];
            row[..n].copy_from_slice(&constraint.coefficients);
            row[width - 1] = constraint.rhs;
            rows.push(row);
        }
        for (j, u) in bound_rows {
            let mut row = vec![0.0; width];
            row[j] = 1.0;
            row[width - 1] = u;
            rows.push(row);
        }
        for (i, row) in rows.iter_mut().enumerate() {
            row[n + i] = 1.0;
        }

        let mut reduced = vec![0.0; width];
        for (j, c) in lp.objective().iter().enumerate() {
            reduced[j] = -c;
        }

        Self {
            rows,
            reduced,
            basis: (n..n + m).collect(),
            num_vars: n,
        }
    }

    fn rhs(&self, row: usize) -> f64 {
        self.rows[row][self.reduced.len() - 1]
    }

    /// Lowest-index column with a negative reduced cost
    fn entering(&self, tolerance: f64) -> Option<usize> {
        self.reduced[..self.reduced.len() - 1]
            .iter()
            .position(|&r| r < -tolerance)
    }

    /// Minimum-ratio row; ties go to the lowest basic variable index
    fn leaving(&self, column: usize, tolerance: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, row) in self.rows.iter().enumerate() {
            let a = row[column];
            if a <= tolerance {
                continue;
            }
            let ratio = self.rhs(i) / a;
            best = match best {
                None => Some((i, ratio)),
                Some((b, r)) if ratio < r || (ratio == r && self.basis[i] < self.basis[b]) => {
                    Some((i, ratio))
                }
                keep => keep,
            };
        }
        best.map(|(i, _)| i)
    }

    fn pivot(&mut self, pivot_row: usize, pivot_col: usize) {
        let pivot = self.rows[pivot_row][pivot_col];
        for v in &mut self.rows[pivot_row] {
            *v /= pivot;
        }
        let normalized = self.rows[pivot_row].clone();

        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == pivot_row {
                continue;
            }
            let factor = row[pivot_col];
            if factor != 0.0 {
                for (v, p) in row.iter_mut().zip(&normalized) {
                    *v -= factor * p;
                }
            }
        }
        let factor = self.reduced[pivot_col];
        if factor != 0.0 {
            for (v, p) in self.reduced.iter_mut().zip(&normalized) {
                *v -= factor * p;
            }
        }
        self.basis[pivot_row] = pivot_col;
    }

    /// Current basic solution restricted to the structural variables
    fn solution(&self) -> Vec<f64> {
        let mut x = vec![0.0; self.num_vars];
        for (row, &var) in self.basis.iter().enumerate() {
            if var < self.num_vars {
                x[var] = self.rhs(row).max(0.0);
            }
        }
        x
    }
}

/// Primal simplex with Bland's rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedSimplex {
    /// Smallest pivot element considered non-zero
    pivot_tolerance: f64,
    /// Reduced costs above `-cost_tolerance` count as optimal
    cost_tolerance: f64,
    tableau: Tableau,
}

impl BoundedSimplex {
    pub fn new(pivot_tolerance: f64) -> Self {
        Self {
            pivot_tolerance,
            cost_tolerance: 0.0,
            tableau: Tableau::default(),
        }
    }
}

impl Solver<LinearProgram, SimplexState> for BoundedSimplex {
    const NAME: &'static str = "Bounded Simplex";

    fn init(
        &mut self,
        problem: &mut Problem<LinearProgram>,
        state: SimplexState,
    ) -> Result<(SimplexState, Option<KV>), Error> {
        let tableau = problem.problem("tableau_count", |lp: &LinearProgram| {
            if lp.constraints().iter().any(|c| c.rhs < 0.0) {
                return Err(ArgminError::InvalidParameter {
                    text: "simplex start requires non-negative right-hand sides".to_string(),
                }
                .into());
            }
            Ok(Tableau::from_program(lp))
        })?;

        let scale = tableau
            .reduced
            .iter()
            .fold(0.0_f64, |acc, r| acc.max(r.abs()));
        self.cost_tolerance = scale * 1e-12;
        self.tableau = tableau;

        let x = self.tableau.solution();
        let cost = problem.cost(&x)?;
        Ok((state.param(x).cost(cost), None))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<LinearProgram>,
        state: SimplexState,
    ) -> Result<(SimplexState, Option<KV>), Error> {
        let Some(column) = self.tableau.entering(self.cost_tolerance) else {
            // already optimal; `terminate` stops before the next call
            return Ok((state, None));
        };
        let Some(row) = self.tableau.leaving(column, self.pivot_tolerance) else {
            return Err(ArgminError::PotentialBug {
                text: format!("objective is unbounded along column {column}"),
            }
            .into());
        };
        self.tableau.pivot(row, column);

        let x = self.tableau.solution();
        let cost = problem.cost(&x)?;
        Ok((state.param(x).cost(cost), None))
    }

    fn terminate(&mut self, _state: &SimplexState) -> TerminationStatus {
        if self.tableau.entering(self.cost_tolerance).is_none() {
            return TerminationStatus::Terminated(TerminationReason::SolverConverged);
        }
        TerminationStatus::NotTerminated
    }
}
