//! Greedy backend for single-resource programs
//!
//! With at most one constraint row (a knapsack with divisible items) the LP
//! optimum fills variables in descending order of objective per unit of the
//! resource until the row is exhausted. Programs with more rows are rejected.

use tracing::debug;
use vaxequity_core::{Error, SolverBackend};

use crate::linear_program::{LinearProgram, LinearSolver, LpSolution};

#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySolver;

impl LinearSolver for GreedySolver {
    fn backend(&self) -> SolverBackend {
        SolverBackend::Greedy
    }

    fn solve(&self, program: &LinearProgram) -> Result<LpSolution, Error> {
        program.check()?;
        if program.constraints().len() > 1 {
            return Err(Error::SolverFailure(format!(
                "greedy backend handles one resource row, got {}",
                program.constraints().len()
            )));
        }

        let n = program.num_vars();
        let objective = program.objective();
        let upper = program.upper_bounds();
        let (weights, mut remaining) = match program.constraints().first() {
            Some(row) => (row.coefficients.clone(), row.rhs),
            None => (vec![0.0; n], f64::INFINITY),
        };

        let mut x = vec![0.0; n];

        // variables that are free with respect to the resource row
        for j in (0..n).filter(|&j| objective[j] > 0.0 && weights[j] <= 0.0) {
            if upper[j].is_infinite() {
                return Err(Error::SolverFailure(format!(
                    "objective is unbounded along variable {j}"
                )));
            }
            x[j] = upper[j];
            remaining -= weights[j] * upper[j];
        }

        let mut order: Vec<usize> = (0..n)
            .filter(|&j| objective[j] > 0.0 && weights[j] > 0.0)
            .collect();
        order.sort_by(|&a, &b| {
            (objective[b] / weights[b])
                .total_cmp(&(objective[a] / weights[a]))
                .then_with(|| a.cmp(&b))
        });

        let mut steps = 0;
        for j in order {
            if remaining <= 0.0 {
                break;
            }
            let take = upper[j].min(remaining / weights[j]);
            if take.is_infinite() {
                return Err(Error::SolverFailure(format!(
                    "objective is unbounded along variable {j}"
                )));
            }
            x[j] = take;
            remaining -= take * weights[j];
            steps += 1;
        }

        debug!(steps, "greedy fill finished");
        Ok(LpSolution {
            objective_value: program.objective_value(&x),
            x,
            iterations: steps,
            status: "SolverConverged".to_string(),
        })
    }
}
