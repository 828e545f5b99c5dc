//! Interfaces between the continuation driver, the nonlinear solver, the discretization
//! and the level hierarchy.

use std::fmt;

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::numerics::hierarchy::GridLevel;

/// Why a nonlinear solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergedReason {
    ConvergedFnormAbs,
    ConvergedFnormRelative,
    DivergedLinearSolve,
    DivergedFunctionNan,
    DivergedLineSearch,
    DivergedMaxIterations,
}

impl ConvergedReason {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            ConvergedReason::ConvergedFnormAbs | ConvergedReason::ConvergedFnormRelative
        )
    }

    /// Failures that a more regularized problem may avoid.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ConvergedReason::DivergedLineSearch | ConvergedReason::DivergedMaxIterations
        )
    }
}

impl fmt::Display for ConvergedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConvergedReason::ConvergedFnormAbs => "CONVERGED_FNORM_ABS",
            ConvergedReason::ConvergedFnormRelative => "CONVERGED_FNORM_RELATIVE",
            ConvergedReason::DivergedLinearSolve => "DIVERGED_LINEAR_SOLVE",
            ConvergedReason::DivergedFunctionNan => "DIVERGED_FNORM_NAN",
            ConvergedReason::DivergedLineSearch => "DIVERGED_LINE_SEARCH",
            ConvergedReason::DivergedMaxIterations => "DIVERGED_MAX_IT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub reason: ConvergedReason,
    pub iterations: u32,
    pub linear_iterations: u32,
    pub residual_norm: f64,
    /// Residual norm before the first and after every accepted step.
    pub history: Vec<f64>,
}

/// Discretized stress balance on one grid level.
pub trait PhysicsModel {
    /// Unknowns per node of the 3D grid.
    fn num_variables(&self) -> usize;

    /// Unknowns of one column; the Jacobian never couples two columns.
    fn block_size(&self, level: &GridLevel) -> usize {
        level.mz * self.num_variables()
    }

    fn size(&self, level: &GridLevel) -> usize {
        level.num_columns() * level.mz * self.num_variables()
    }

    fn residual(&self, level: &GridLevel, eps: f64, x: &DVector<f64>) -> DVector<f64>;

    fn residual_and_jacobian(
        &self,
        level: &GridLevel,
        eps: f64,
        x: &DVector<f64>,
    ) -> (DVector<f64>, CsrMatrix<f64>);
}

/// Grid-level hooks called by a multigrid-aware nonlinear solver.
///
/// `coarsen` allocates the level below `fine` and returns its index; the returned
/// level handles further coarsening the same way. `restrict` fills the coarse level's
/// data from the fine one.
pub trait LevelHierarchy {
    fn coarsen(&mut self, fine: usize) -> usize;
    fn restrict(&mut self, fine: usize, coarse: usize);
    fn level(&self, index: usize) -> &GridLevel;
    fn num_levels(&self) -> usize;
}

/// A nonlinear solve of the stress balance for a given regularization parameter.
///
/// `x` holds the initial guess on entry and the last iterate on return.
pub trait RegularizedSolve {
    fn max_iterations(&self) -> u32;
    fn solve(&mut self, x: &mut DVector<f64>, eps: f64) -> SolveReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_classes() {
        assert!(ConvergedReason::ConvergedFnormRelative.is_converged());
        assert!(!ConvergedReason::DivergedLineSearch.is_converged());
        assert!(ConvergedReason::DivergedMaxIterations.is_recoverable());
        assert!(!ConvergedReason::DivergedLinearSolve.is_recoverable());
        assert!(!ConvergedReason::DivergedFunctionNan.is_recoverable());
        assert_eq!(ConvergedReason::DivergedLineSearch.to_string(), "DIVERGED_LINE_SEARCH");
    }
}
