//! Solver setup and execution

use std::time::Duration;

use argmin::core::observers::ObserverMode;
use argmin::core::{Executor, State, TerminationReason, TerminationStatus};
use argmin_observer_slog::SlogLogger;
use tracing::{debug, info, warn};
use vaxequity_core::{
    CountryTable, EquityEvaluator, EquityWeighting, Error, SolverBackend, SolverSettings,
};

use crate::allocation_problem::AllocationProblem;
use crate::greedy::GreedySolver;
use crate::linear_program::{LinearProgram, LinearSolver, LpSolution};
use crate::observer::TracingObserver;
use crate::simplex::BoundedSimplex;
use crate::types::{AllocationOutcome, AllocationResult, OptimizationReport};

/// Configuration for the simplex backend
#[derive(Debug, Clone)]
pub struct SimplexConfig {
    /// Maximum number of pivots
    pub max_iterations: u64,

    /// Smallest pivot element treated as non-zero
    pub pivot_tolerance: f64,

    /// Wall-clock budget for the solve
    pub timeout: Option<Duration>,

    /// Number of iterations between observer table headers
    pub header_interval: u64,

    /// Also log every iteration to the terminal through slog
    pub verbose: bool,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            pivot_tolerance: 1e-12,
            timeout: None,
            header_interval: 100,
            verbose: false,
        }
    }
}

impl SimplexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_pivot_tolerance(mut self, tolerance: f64) -> Self {
        self.pivot_tolerance = tolerance;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header_interval(mut self, header_interval: u64) -> Self {
        self.header_interval = header_interval;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Algorithm-specific optimization configuration
#[derive(Debug, Clone)]
pub enum OptimizationConfig {
    /// Primal simplex; handles any program with a non-negative right-hand side
    Simplex(SimplexConfig),

    /// Exact for a single budget row, used as a cross-check
    Greedy,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        OptimizationConfig::Simplex(SimplexConfig::default())
    }
}

impl From<&SolverSettings> for OptimizationConfig {
    fn from(settings: &SolverSettings) -> Self {
        match settings.backend {
            SolverBackend::Simplex => {
                let mut config = SimplexConfig::new()
                    .with_max_iterations(settings.max_iterations)
                    .with_verbose(settings.verbose);
                if let Some(secs) = settings.timeout_secs {
                    config = config.with_timeout(Duration::from_secs_f64(secs));
                }
                OptimizationConfig::Simplex(config)
            }
            SolverBackend::Greedy => OptimizationConfig::Greedy,
        }
    }
}

impl OptimizationConfig {
    pub fn backend(&self) -> SolverBackend {
        match self {
            OptimizationConfig::Simplex(_) => SolverBackend::Simplex,
            OptimizationConfig::Greedy => SolverBackend::Greedy,
        }
    }

    pub fn solver(&self) -> Box<dyn LinearSolver> {
        match self {
            OptimizationConfig::Simplex(config) => Box::new(SimplexSolver::new(config.clone())),
            OptimizationConfig::Greedy => Box::new(GreedySolver),
        }
    }
}

/// Runs [`BoundedSimplex`] under an argmin executor.
#[derive(Debug, Clone, Default)]
pub struct SimplexSolver {
    config: SimplexConfig,
}

impl SimplexSolver {
    pub fn new(config: SimplexConfig) -> Self {
        Self { config }
    }
}

impl LinearSolver for SimplexSolver {
    fn backend(&self) -> SolverBackend {
        SolverBackend::Simplex
    }

    fn solve(&self, program: &LinearProgram) -> Result<LpSolution, Error> {
        program.check()?;
        let config = &self.config;

        let mut executor = Executor::new(
            program.clone(),
            BoundedSimplex::new(config.pivot_tolerance),
        )
        .configure(|state| state.max_iters(config.max_iterations))
        .add_observer(
            TracingObserver::with_header_interval(config.header_interval),
            ObserverMode::Always,
        );
        if let Some(timeout) = config.timeout {
            executor = executor.timeout(timeout);
        }
        if config.verbose {
            info!(
                variables = program.num_vars(),
                rows = program.constraints().len(),
                max_iterations = config.max_iterations,
                "=== Simplex Optimization (Verbose Mode) ==="
            );
            executor = executor.add_observer(SlogLogger::term(), ObserverMode::Always);
        }

        let result = executor
            .run()
            .map_err(|e| Error::SolverFailure(format!("optimization failed: {e}")))?;
        let state = result.state();

        match state.get_termination_status() {
            TerminationStatus::Terminated(TerminationReason::SolverConverged) => {}
            TerminationStatus::Terminated(TerminationReason::Timeout) => {
                return Err(Error::SolverTimeout {
                    elapsed: state.get_time().unwrap_or_default(),
                });
            }
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
                return Err(Error::SolverFailure(format!(
                    "no optimum after {} iterations",
                    state.get_iter()
                )));
            }
            other => {
                return Err(Error::SolverFailure(format!(
                    "solver stopped early: {other:?}"
                )));
            }
        }

        // pivots never lower the objective, so the current vertex is the optimum
        // even when a final gain is too small to register as a new best cost
        let x = state
            .get_param()
            .cloned()
            .ok_or_else(|| Error::SolverFailure("solver returned no solution".to_string()))?;

        Ok(LpSolution {
            objective_value: program.objective_value(&x),
            x,
            iterations: state.get_iter(),
            status: format!("{:?}", TerminationReason::SolverConverged),
        })
    }
}

/// Solve `problem` and evaluate the equity of the resulting allocation.
///
/// # Example
///
/// ```rust,ignore
/// use vaxequity_allocation::{optimize, AllocationProblem, OptimizationConfig, SimplexConfig};
///
/// let problem = AllocationProblem::from_network(&table, &network, &scores, &config, 1e6)?;
/// let config = OptimizationConfig::Simplex(SimplexConfig::new().with_max_iterations(500));
/// let outcome = optimize(&problem, &table, &config, EquityWeighting::Population)?;
/// println!("allocated {}", outcome.result.total_allocated);
/// ```
pub fn optimize(
    problem: &AllocationProblem,
    table: &CountryTable,
    config: &OptimizationConfig,
    weighting: EquityWeighting,
) -> Result<AllocationOutcome, Error> {
    let solver = config.solver();
    let program = problem.to_linear_program();
    let solution = solver.solve(&program)?;

    let x = problem.clean_solution(&solution.x);
    let allocation = problem.allocation_map(&x);
    let total_allocated: f64 = x.iter().sum();
    if total_allocated < problem.budget() {
        debug!(
            unallocated = problem.budget() - total_allocated,
            "budget exceeds binding capacity and cap constraints"
        );
    }
    if !program.is_feasible(&x, 1e-6 * problem.budget().max(1.0)) {
        warn!("cleaned allocation violates a constraint beyond tolerance");
    }

    let equity_metrics = EquityEvaluator::new(weighting).evaluate(table, Some(&allocation));
    let report = OptimizationReport {
        status: solution.status,
        objective_value: program.objective_value(&x),
        iterations: solution.iterations,
        backend: solver.backend(),
        budget: problem.budget(),
        improvement_pct: equity_metrics.improvement_pct(),
    };
    info!(
        backend = ?report.backend,
        iterations = report.iterations,
        total_allocated,
        budget = problem.budget(),
        before_gini = equity_metrics.before_gini,
        after_gini = equity_metrics.after_gini,
        "allocation optimized"
    );

    Ok(AllocationOutcome {
        result: AllocationResult {
            total_allocated,
            allocation,
            equity_metrics,
        },
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaxequity_core::ConstraintClass;

    #[test]
    fn test_settings_map_to_config() {
        let settings = SolverSettings {
            timeout_secs: Some(2.5),
            ..SolverSettings::default()
        };
        match OptimizationConfig::from(&settings) {
            OptimizationConfig::Simplex(config) => {
                assert_eq!(config.max_iterations, 10_000);
                assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
            }
            OptimizationConfig::Greedy => panic!("expected simplex"),
        }

        let greedy = SolverSettings {
            backend: SolverBackend::Greedy,
            ..SolverSettings::default()
        };
        assert_eq!(OptimizationConfig::from(&greedy).backend(), SolverBackend::Greedy);
    }

    #[test]
    fn test_max_iterations_is_a_solver_failure() {
        // needs two pivots
        let lp = LinearProgram::new(vec![1.0, 1.0])
            .with_constraint(vec![1.0, 1.0], 10.0, ConstraintClass::Budget)
            .with_upper_bounds(vec![4.0, 4.0]);
        let solver = SimplexSolver::new(SimplexConfig::new().with_max_iterations(1));
        let err = solver.solve(&lp).unwrap_err();
        assert!(matches!(err, Error::SolverFailure(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_timeout_is_reported_separately() {
        // ten pivots, one per variable
        let lp = LinearProgram::new(vec![1.0; 10])
            .with_constraint(vec![1.0; 10], 100.0, ConstraintClass::Budget)
            .with_upper_bounds(vec![1.0; 10]);
        let solver =
            SimplexSolver::new(SimplexConfig::new().with_timeout(Duration::from_nanos(1)));
        let err = solver.solve(&lp).unwrap_err();
        assert!(matches!(err, Error::SolverTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_sub_ulp_final_pivot_is_kept() {
        // the second pivot adds 2e-8 to an objective near 4e8
        let lp = LinearProgram::new(vec![0.8 + 2e-10, 2e-10])
            .with_constraint(vec![1.0, 1.0], 5e8 + 100.0, ConstraintClass::Budget)
            .with_upper_bounds(vec![5e8, 5e8]);
        let simplex = SimplexSolver::default().solve(&lp).unwrap();
        let greedy = GreedySolver.solve(&lp).unwrap();
        assert!((simplex.x[0] - 5e8).abs() < 1e-6);
        assert!((simplex.x[1] - 100.0).abs() < 1e-6);
        assert!((simplex.x[1] - greedy.x[1]).abs() < 1e-6);
    }

    #[test]
    fn test_simplex_and_greedy_agree() {
        let lp = LinearProgram::new(vec![0.4, 0.9, 0.1, 0.7])
            .with_constraint(vec![1.0; 4], 25.0, ConstraintClass::Budget)
            .with_upper_bounds(vec![10.0, 8.0, 30.0, 12.0]);
        let simplex = SimplexSolver::default().solve(&lp).unwrap();
        let greedy = GreedySolver.solve(&lp).unwrap();
        assert!((simplex.objective_value - greedy.objective_value).abs() < 1e-9);
        for (a, b) in simplex.x.iter().zip(&greedy.x) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
