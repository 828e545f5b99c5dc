use std::time::Instant;

use log::{debug, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::numerics::multigrid::{MultigridLevel, MultigridSolver, VerticalTransfer};
use crate::numerics::solver::{
    ConvergedReason, LevelHierarchy, PhysicsModel, RegularizedSolve, SolveReport,
};
use crate::numerics::timing::{finish_and_log, record, reset_timing, Phase};
use crate::numerics::Convergence;

/// Newton's method with backtracking (Armijo) line search and a multigrid linear solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonArmijoSolver {
    pub convergence: Convergence,
    pub max_iterations: u32,
    /// Minimum step size before we give up
    pub min_step_size: f64,
    /// Parameter for sufficient decrease (usually 1e-4)
    pub armijo_param: f64,
    /// Maximum step size to prevent large jumps (None = no limit)
    pub max_step: Option<f64>,
    pub multigrid: MultigridSolver,
    /// Number of multigrid levels, including the finest one.
    pub mg_levels: usize,
}

impl Default for NewtonArmijoSolver {
    fn default() -> Self {
        Self {
            convergence: Convergence::default(),
            max_iterations: 50,
            min_step_size: 1e-3,
            armijo_param: 1e-4,
            max_step: None,
            multigrid: MultigridSolver::default(),
            mg_levels: 2,
        }
    }
}

impl NewtonArmijoSolver {
    pub fn with_mg_levels(mut self, mg_levels: usize) -> Self {
        self.mg_levels = mg_levels;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Solves `F(x) = 0` on the finest level of `hierarchy`, starting from `x`.
    ///
    /// Coarse levels are allocated and filled through the hierarchy hooks once, at the
    /// start of the solve.
    pub fn solve<M, H>(
        &self,
        model: &M,
        hierarchy: &mut H,
        x: &mut DVector<f64>,
        eps: f64,
    ) -> SolveReport
    where
        M: PhysicsModel,
        H: LevelHierarchy,
    {
        reset_timing();
        let solve_start = Instant::now();

        let mut levels = vec![0];
        for _ in 1..self.mg_levels.max(1) {
            let fine = levels[levels.len() - 1];
            levels.push(hierarchy.coarsen(fine));
        }
        // model parameters are fixed during one solve
        for pair in levels.windows(2) {
            hierarchy.restrict(pair[0], pair[1]);
        }

        let mut norm = self
            .convergence
            .norm(&model.residual(hierarchy.level(0), eps, x));
        let initial_norm = norm;
        let mut history = vec![norm];
        let mut linear_iterations = 0;

        let report = |reason, iterations, linear_iterations, norm, history| SolveReport {
            reason,
            iterations,
            linear_iterations,
            residual_norm: norm,
            history,
        };

        if !norm.is_finite() {
            return report(ConvergedReason::DivergedFunctionNan, 0, 0, norm, history);
        }
        if let Some(reason) = self.convergence.check(norm, initial_norm) {
            return report(reason, 0, 0, norm, history);
        }

        for i in 1..=self.max_iterations {
            let (residual, operators) =
                record(Phase::Assembly, || self.assemble(model, &*hierarchy, &levels, eps, x));

            let rhs = -residual;
            let mut delta_x = match record(Phase::LinearSolve, || self.multigrid.solve(&operators, &rhs)) {
                Ok((delta_x, cycles)) => {
                    linear_iterations += cycles;
                    delta_x
                }
                Err(e) => {
                    warn!("Linear solve failed at Newton iteration {i}: {e}");
                    finish_and_log(solve_start.elapsed());
                    return report(
                        ConvergedReason::DivergedLinearSolve,
                        i - 1,
                        linear_iterations,
                        norm,
                        history,
                    );
                }
            };

            // Optionally limit the max norm of delta_x to prevent massive potential jumps
            if let Some(max_step) = self.max_step {
                let max_update = delta_x.amax();
                if max_update > max_step {
                    delta_x *= max_step / max_update;
                }
            }

            // Backtracking line search
            let mut alpha = 1.0;
            let mut accepted = false;
            while alpha > self.min_step_size {
                let candidate = &*x + &delta_x * alpha;
                let candidate_norm = self
                    .convergence
                    .norm(&model.residual(hierarchy.level(0), eps, &candidate));

                // ||F_new|| < (1 - alpha * c) * ||F_old||
                if candidate_norm.is_finite()
                    && candidate_norm < (1.0 - alpha * self.armijo_param) * norm
                {
                    *x = candidate;
                    norm = candidate_norm;
                    accepted = true;
                    break;
                }
                alpha *= 0.5;
            }

            if !accepted {
                debug!("  Newton {i}: line search failed to find sufficient decrease");
                finish_and_log(solve_start.elapsed());
                return report(
                    ConvergedReason::DivergedLineSearch,
                    i - 1,
                    linear_iterations,
                    norm,
                    history,
                );
            }

            history.push(norm);
            debug!(
                "  Newton {i}/{}: |F| = {norm:.4e} ({:.3e} of initial), step {alpha}",
                self.max_iterations,
                norm / initial_norm
            );

            if let Some(reason) = self.convergence.check(norm, initial_norm) {
                finish_and_log(solve_start.elapsed());
                return report(reason, i, linear_iterations, norm, history);
            }
        }

        finish_and_log(solve_start.elapsed());
        report(
            ConvergedReason::DivergedMaxIterations,
            self.max_iterations,
            linear_iterations,
            norm,
            history,
        )
    }

    /// Residual on the finest level and the Jacobians of every level; coarse Jacobians
    /// are evaluated at the injected state.
    fn assemble<M, H>(
        &self,
        model: &M,
        hierarchy: &H,
        levels: &[usize],
        eps: f64,
        x: &DVector<f64>,
    ) -> (DVector<f64>, Vec<MultigridLevel>)
    where
        M: PhysicsModel,
        H: LevelHierarchy,
    {
        let finest = hierarchy.level(levels[0]);
        let (residual, matrix) = model.residual_and_jacobian(finest, eps, x);

        let mut operators = vec![MultigridLevel::new(matrix, model.block_size(finest))];
        let mut state = x.clone();
        for pair in levels.windows(2) {
            let (fine, coarse) = (hierarchy.level(pair[0]), hierarchy.level(pair[1]));
            let factor = (fine.mz - 1) / (coarse.mz - 1);
            let transfer =
                VerticalTransfer::new(fine.mz, factor, fine.num_columns(), model.num_variables());

            state = transfer.inject(&state);
            let (_, matrix) = model.residual_and_jacobian(coarse, eps, &state);

            if let Some(last) = operators.last_mut() {
                last.transfer = Some(transfer);
            }
            operators.push(MultigridLevel::new(matrix, model.block_size(coarse)));
        }
        (residual, operators)
    }
}

/// Binds a solver, a model and a level hierarchy into one regularized solve.
pub struct HierarchicalSolve<'a, M, H> {
    pub solver: &'a NewtonArmijoSolver,
    pub model: &'a M,
    pub hierarchy: &'a mut H,
}

impl<M: PhysicsModel, H: LevelHierarchy> RegularizedSolve for HierarchicalSolve<'_, M, H> {
    fn max_iterations(&self) -> u32 {
        self.solver.max_iterations
    }

    fn solve(&mut self, x: &mut DVector<f64>, eps: f64) -> SolveReport {
        self.solver.solve(self.model, &mut *self.hierarchy, x, eps)
    }
}
