//! Parameter continuation on the viscosity regularization.
//!
//! The regularization `eps(lambda) = max(10^(lambda * gamma), eps_target)` with
//! `gamma = floor(log10(eps_target))` maps `lambda in [lambda_min, lambda_max]` onto
//! progressively less regularized problems. The driver first tries the target problem
//! directly. If that fails it restarts from a zero guess at `lambda_min` and advances
//! `lambda` with steps that grow when the nonlinear solver converges easily and shrink
//! (after rolling back to the last accepted solution) when it diverges.

use log::{info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::numerics::solver::{ConvergedReason, RegularizedSolve};

const LAMBDA_TOLERANCE: f64 = 1e-9;
const DELTA_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum ContinuationError {
    #[error("parameter continuation failed at step {step}")]
    ContinuationFailed { step: u32 },
    #[error("cannot reduce the continuation step (step {step}, lambda = {lambda})")]
    CannotReduceStep { step: u32, lambda: f64 },
    #[error("nonlinear solver failed at step {step}: {reason}")]
    SolverFailed { step: u32, reason: ConvergedReason },
    #[error("failed after {steps} parameter continuation steps")]
    TooManySteps { steps: u32 },
    #[error("invalid continuation parameters: {0}")]
    InvalidParameters(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuationParameters {
    pub lambda_min: f64,
    pub lambda_max: f64,
    /// Step used when continuation starts.
    pub delta0: f64,
    pub delta_min: f64,
    pub delta_max: f64,
    /// Step growth aggressiveness, non-negative.
    pub aggressiveness: f64,
    /// Continuation steps after the first attempt.
    pub max_steps: u32,
}

impl Default for ContinuationParameters {
    fn default() -> Self {
        Self {
            lambda_min: 0.75,
            lambda_max: 1.0,
            delta0: 0.05,
            delta_min: 0.01,
            delta_max: 0.2,
            aggressiveness: 1.0,
            max_steps: 20,
        }
    }
}

impl ContinuationParameters {
    pub fn validate(&self) -> Result<(), ContinuationError> {
        let invalid = |message: &str| Err(ContinuationError::InvalidParameters(message.to_string()));
        if !(self.lambda_min > 0.0 && self.lambda_min <= self.lambda_max) {
            return invalid("need 0 < lambda_min <= lambda_max");
        }
        if !(self.delta_min > 0.0 && self.delta_min <= self.delta0 && self.delta0 <= self.delta_max) {
            return invalid("need 0 < delta_min <= delta0 <= delta_max");
        }
        if self.aggressiveness < 0.0 {
            return invalid("aggressiveness has to be non-negative");
        }
        Ok(())
    }
}

/// States of the continuation loop. A step record stores the state the step ended in;
/// a failed continuation ends with a [`ContinuationError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContinuationState {
    Start,
    Solving,
    Accepted,
    RejectedBacktrack,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationStep {
    pub step: u32,
    pub lambda: f64,
    pub eps: f64,
    pub reason: ConvergedReason,
    pub iterations: u32,
    pub linear_iterations: u32,
    pub state: ContinuationState,
    /// Step length after the transition.
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContinuationReport {
    pub steps: Vec<ContinuationStep>,
    pub nonlinear_iterations: u32,
    pub linear_iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContinuationSolver {
    pub parameters: ContinuationParameters,
}

impl ContinuationSolver {
    pub fn new(parameters: ContinuationParameters) -> Self {
        Self { parameters }
    }

    pub fn regularization(lambda: f64, eps_target: f64) -> f64 {
        let gamma = eps_target.log10().floor();
        10f64.powf(lambda * gamma).max(eps_target)
    }

    /// Solves the problem regularized with `eps_target`, continuing in `lambda` if needed.
    ///
    /// `x` holds the initial guess on entry and the solution on success.
    pub fn run<S: RegularizedSolve>(
        &self,
        solver: &mut S,
        x: &mut DVector<f64>,
        eps_target: f64,
    ) -> Result<ContinuationReport, ContinuationError> {
        let p = &self.parameters;
        p.validate()?;

        let max_iterations = solver.max_iterations().max(1);
        let mut lambda = p.lambda_max;
        let mut delta = p.delta0;
        let mut x_old = x.clone();
        let mut report = ContinuationReport::default();

        for step in 0..=p.max_steps {
            let eps = Self::regularization(lambda, eps_target);
            if step > 0 {
                info!("Blatter solver: step {step} with lambda = {lambda:.6}, eps = {eps:e}");
            } else {
                info!("Blatter solver: start with eps = {eps:e}");
            }

            let result = solver.solve(x, eps);
            let (reason, its) = (result.reason, result.iterations);
            if step > 0 {
                info!(
                    "Blatter solver: {reason} step {step} with lambda = {lambda:.6}, eps = {eps:e}: \
                     nonlinear: {its}, linear: {}",
                    result.linear_iterations
                );
            }
            report.nonlinear_iterations += its;
            report.linear_iterations += result.linear_iterations;

            let mut record = ContinuationStep {
                step,
                lambda,
                eps,
                reason,
                iterations: its,
                linear_iterations: result.linear_iterations,
                state: ContinuationState::Solving,
                delta,
            };

            if reason.is_converged() {
                if eps <= eps_target * (1.0 + 1e-10) {
                    info!(
                        "Blatter solver: done. nonlinear: {}, linear: {}",
                        report.nonlinear_iterations, report.linear_iterations
                    );
                    record.state = ContinuationState::Done;
                    report.steps.push(record);
                    return Ok(report);
                }

                x_old.copy_from(&*x);

                if step > 1 {
                    let f = max_iterations.saturating_sub(its) as f64 / max_iterations as f64;
                    delta *= 1.0 + p.aggressiveness * f * f;
                }
                delta = delta.min(p.delta_max);

                if lambda + delta >= p.lambda_max {
                    delta = p.lambda_max - lambda;
                    lambda = p.lambda_max;
                } else {
                    lambda += delta;
                }
                info!("  Using delta = {delta:.6}");
                record.state = ContinuationState::Accepted;
            } else if reason.is_recoverable() {
                if step == 0 {
                    lambda = p.lambda_min;
                    delta = p.delta0;
                    x.fill(0.0);
                    x_old.fill(0.0);
                    info!("  Starting parameter continuation with lambda = {lambda:.6}");
                    record.state = ContinuationState::Start;
                } else {
                    x.copy_from(&x_old);
                    lambda -= delta;

                    if lambda < p.lambda_min - LAMBDA_TOLERANCE {
                        return Err(ContinuationError::ContinuationFailed { step });
                    }
                    if (delta - p.delta_min).abs() < DELTA_TOLERANCE {
                        return Err(ContinuationError::CannotReduceStep { step, lambda });
                    }

                    delta = (0.5 * delta).clamp(p.delta_min, p.delta_max);
                    lambda += delta;
                    info!("  Back-tracking to lambda = {lambda:.6} using delta = {delta:.6}");
                    record.state = ContinuationState::RejectedBacktrack;
                }
            } else {
                warn!("Blatter solver: {reason} at step {step}");
                return Err(ContinuationError::SolverFailed { step, reason });
            }

            record.delta = delta;
            report.steps.push(record);
        }

        Err(ContinuationError::TooManySteps { steps: p.max_steps })
    }
}
