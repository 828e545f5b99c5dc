pub mod continuation;
pub mod hierarchy;
pub mod multigrid;
pub mod newton;
pub mod solver;
pub mod timing;

use serde::{Deserialize, Serialize};

use solver::ConvergedReason;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    Absolute(f64),
    Relative(f64),
    Combined(f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceMetric {
    #[default]
    L2Norm,
    MaxNorm,
}

/// Residual-based stopping test of an iterative solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub tolerance: Tolerance,
    pub metric: ConvergenceMetric,
}

impl Default for Convergence {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::Combined(1e-50, 1e-8),
            metric: ConvergenceMetric::L2Norm,
        }
    }
}

impl Convergence {
    pub fn norm(&self, vector: &nalgebra::DVector<f64>) -> f64 {
        match self.metric {
            ConvergenceMetric::L2Norm => vector.norm(),
            ConvergenceMetric::MaxNorm => vector.amax(),
        }
    }

    /// Which tolerance, if any, `norm` satisfies.
    pub fn check(&self, norm: f64, initial_norm: f64) -> Option<ConvergedReason> {
        let absolute = |tol: f64| (norm < tol).then_some(ConvergedReason::ConvergedFnormAbs);
        let relative = |tol: f64| {
            (initial_norm > 0.0 && norm / initial_norm < tol)
                .then_some(ConvergedReason::ConvergedFnormRelative)
        };
        match self.tolerance {
            Tolerance::Absolute(tol) => absolute(tol),
            Tolerance::Relative(tol) => relative(tol),
            Tolerance::Combined(abs_tol, rel_tol) => absolute(abs_tol).or_else(|| relative(rel_tol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn combined_tolerance_reports_which_test_passed() {
        let c = Convergence::default();
        assert_eq!(c.check(0.0, 1.0), Some(ConvergedReason::ConvergedFnormAbs));
        assert_eq!(c.check(1e-9, 1.0), Some(ConvergedReason::ConvergedFnormRelative));
        assert_eq!(c.check(1e-3, 1.0), None);

        let c = Convergence {
            tolerance: Tolerance::Absolute(1e-3),
            metric: ConvergenceMetric::MaxNorm,
        };
        assert_eq!(c.norm(&DVector::from_vec(vec![1.0, -3.0, 2.0])), 3.0);
        assert_eq!(c.check(1e-4, 1e-4), Some(ConvergedReason::ConvergedFnormAbs));
    }
}
