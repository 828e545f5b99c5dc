//! Vertical semi-coarsening multigrid.
//!
//! Coarse levels keep the map-plane grid and reduce the number of vertical levels by a
//! constant factor. The linear solve is a V-cycle with Gauss-Seidel smoothing,
//! re-discretized coarse operators and column-by-column LU solves on the coarsest level.
//! Unknowns fixed by identity rows are excluded from coarse-grid corrections.

use log::trace;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discretization::vertical::coarse_mz;
use crate::discretization::{GridTopology, NodeField};

#[derive(Debug, Error, PartialEq)]
pub enum LinearSolveError {
    #[error("direct solve on the coarsest level failed")]
    Singular,
    #[error("multigrid did not converge in {cycles} cycles (relative residual {relative:.3e})")]
    NonConvergence { cycles: u32, relative: f64 },
    #[error("no multigrid levels")]
    NoLevels,
    #[error("row {row} couples to column {column} outside of its block")]
    CoupledBlocks { row: usize, column: usize },
}

/// Transfers 2D and column fields from a fine level to the next coarser one.
pub trait Restriction {
    fn restrict_2d(&self, grid: &GridTopology, fine: &NodeField<f64>) -> NodeField<f64>;
    fn restrict_column(&self, fine: &[f64]) -> Vec<f64>;
}

/// Restriction for vertical semi-coarsening: map-plane fields are unchanged, columns are
/// averaged with normalized full weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemiCoarsening {
    pub factor: usize,
}

impl Restriction for SemiCoarsening {
    fn restrict_2d(&self, _grid: &GridTopology, fine: &NodeField<f64>) -> NodeField<f64> {
        fine.clone()
    }

    fn restrict_column(&self, fine: &[f64]) -> Vec<f64> {
        let transfer = VerticalTransfer::new(fine.len(), self.factor, 1, 1);
        let weights = transfer.restrict(&DVector::from_element(fine.len(), 1.0));
        let sums = transfer.restrict(&DVector::from_column_slice(fine));
        sums.iter().zip(weights.iter()).map(|(s, w)| s / w).collect()
    }
}

/// Linear interpolation between vertical grids of `fine_mz` and `coarse_mz` levels for
/// vectors laid out as `((column * mz + k) * dof + component)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalTransfer {
    pub fine_mz: usize,
    pub coarse_mz: usize,
    pub factor: usize,
    pub columns: usize,
    pub dof: usize,
}

impl VerticalTransfer {
    pub fn new(fine_mz: usize, factor: usize, columns: usize, dof: usize) -> Self {
        Self {
            fine_mz,
            coarse_mz: coarse_mz(fine_mz, factor),
            factor,
            columns,
            dof,
        }
    }

    pub fn fine_len(&self) -> usize {
        self.columns * self.fine_mz * self.dof
    }

    pub fn coarse_len(&self) -> usize {
        self.columns * self.coarse_mz * self.dof
    }

    /// Coarse levels and weights contributing to fine level `k`.
    fn stencil(&self, k: usize) -> [(usize, f64); 2] {
        let kc = k / self.factor;
        let t = (k % self.factor) as f64 / self.factor as f64;
        if t == 0.0 {
            [(kc, 1.0), (kc, 0.0)]
        } else {
            [(kc, 1.0 - t), (kc + 1, t)]
        }
    }

    pub fn prolong(&self, coarse: &DVector<f64>) -> DVector<f64> {
        let mut fine = DVector::zeros(self.fine_len());
        for col in 0..self.columns {
            for k in 0..self.fine_mz {
                for (kc, w) in self.stencil(k) {
                    for c in 0..self.dof {
                        fine[(col * self.fine_mz + k) * self.dof + c] +=
                            w * coarse[(col * self.coarse_mz + kc) * self.dof + c];
                    }
                }
            }
        }
        fine
    }

    /// Transpose of [`prolong`](Self::prolong); maps fine residuals to coarse ones.
    pub fn restrict(&self, fine: &DVector<f64>) -> DVector<f64> {
        let mut coarse = DVector::zeros(self.coarse_len());
        for col in 0..self.columns {
            for k in 0..self.fine_mz {
                for (kc, w) in self.stencil(k) {
                    for c in 0..self.dof {
                        coarse[(col * self.coarse_mz + kc) * self.dof + c] +=
                            w * fine[(col * self.fine_mz + k) * self.dof + c];
                    }
                }
            }
        }
        coarse
    }

    /// Samples a fine-level state at the coarse levels.
    pub fn inject(&self, fine: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.coarse_len(), |idx, _| {
            let c = idx % self.dof;
            let kc = (idx / self.dof) % self.coarse_mz;
            let col = idx / (self.dof * self.coarse_mz);
            fine[(col * self.fine_mz + kc * self.factor) * self.dof + c]
        })
    }
}

/// Operator of one multigrid level and the transfer to the next coarser one.
///
/// The operator couples unknowns of one column only: rows and columns are grouped in
/// consecutive blocks of `block_size`.
#[derive(Debug, Clone)]
pub struct MultigridLevel {
    pub matrix: CsrMatrix<f64>,
    pub block_size: usize,
    pub transfer: Option<VerticalTransfer>,
    /// Rows with a nonzero diagonal and no off-diagonal entries; their unknowns are fixed.
    dirichlet: Vec<bool>,
}

impl MultigridLevel {
    pub fn new(matrix: CsrMatrix<f64>, block_size: usize) -> Self {
        let dirichlet = (0..matrix.nrows())
            .map(|i| {
                let row = matrix.row(i);
                let mut diagonal = 0.0;
                let mut coupled = false;
                for (&j, &v) in row.col_indices().iter().zip(row.values()) {
                    if j == i {
                        diagonal = v;
                    } else if v != 0.0 {
                        coupled = true;
                    }
                }
                diagonal != 0.0 && !coupled
            })
            .collect();
        Self {
            matrix,
            block_size,
            transfer: None,
            dirichlet,
        }
    }

    pub fn with_transfer(mut self, transfer: VerticalTransfer) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn is_dirichlet(&self, row: usize) -> bool {
        self.dirichlet[row]
    }

    /// Zeroes the entries of `v` at fixed unknowns.
    fn mask(&self, v: &mut DVector<f64>) {
        for (value, &fixed) in v.iter_mut().zip(&self.dirichlet) {
            if fixed {
                *value = 0.0;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultigridSolver {
    pub pre_smooth: usize,
    pub post_smooth: usize,
    /// Relative residual reduction that ends the solve.
    pub tolerance: f64,
    pub max_cycles: u32,
}

impl Default for MultigridSolver {
    fn default() -> Self {
        Self {
            pre_smooth: 2,
            post_smooth: 2,
            tolerance: 1e-8,
            max_cycles: 100,
        }
    }
}

impl MultigridSolver {
    /// Solves `levels[0].matrix * x = rhs`; returns the solution and the number of cycles.
    ///
    /// A single level is solved directly.
    pub fn solve(
        &self,
        levels: &[MultigridLevel],
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, u32), LinearSolveError> {
        let finest = levels.first().ok_or(LinearSolveError::NoLevels)?;
        if levels.len() == 1 {
            return Ok((direct_solve(finest, rhs)?, 1));
        }

        let rhs_norm = rhs.norm();
        let mut x = DVector::zeros(rhs.len());
        if rhs_norm == 0.0 {
            return Ok((x, 0));
        }

        let mut relative = 1.0;
        for cycle in 1..=self.max_cycles {
            self.v_cycle(levels, rhs, &mut x)?;
            relative = residual(&finest.matrix, rhs, &x).norm() / rhs_norm;
            trace!("  multigrid cycle {cycle}: relative residual {relative:.3e}");
            if relative < self.tolerance {
                return Ok((x, cycle));
            }
        }
        Err(LinearSolveError::NonConvergence {
            cycles: self.max_cycles,
            relative,
        })
    }

    fn v_cycle(
        &self,
        levels: &[MultigridLevel],
        rhs: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> Result<(), LinearSolveError> {
        let level = &levels[0];
        let (Some(transfer), Some(coarse)) = (&level.transfer, levels.get(1)) else {
            *x = direct_solve(level, rhs)?;
            return Ok(());
        };

        gauss_seidel(&level.matrix, rhs, x, self.pre_smooth);

        // fixed unknowns get no coarse-grid correction
        let mut coarse_rhs = transfer.restrict(&residual(&level.matrix, rhs, x));
        coarse.mask(&mut coarse_rhs);
        let mut correction = DVector::zeros(coarse_rhs.len());
        self.v_cycle(&levels[1..], &coarse_rhs, &mut correction)?;
        let mut fine_correction = transfer.prolong(&correction);
        level.mask(&mut fine_correction);
        *x += fine_correction;

        gauss_seidel(&level.matrix, rhs, x, self.post_smooth);
        Ok(())
    }
}

/// `rhs - matrix * x`
pub fn residual(matrix: &CsrMatrix<f64>, rhs: &DVector<f64>, x: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(rhs.len(), |i, _| {
        let row = matrix.row(i);
        let product: f64 = row
            .col_indices()
            .iter()
            .zip(row.values())
            .map(|(&j, v)| v * x[j])
            .sum();
        rhs[i] - product
    })
}

/// LU solve of every diagonal block of the level operator.
fn direct_solve(level: &MultigridLevel, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
    let n = level.matrix.nrows();
    let m = level.block_size.clamp(1, n.max(1));
    let mut x = DVector::zeros(n);

    for start in (0..n).step_by(m) {
        let size = m.min(n - start);
        let mut block = DMatrix::zeros(size, size);
        for r in 0..size {
            let row = level.matrix.row(start + r);
            for (&j, &v) in row.col_indices().iter().zip(row.values()) {
                if (start..start + size).contains(&j) {
                    block[(r, j - start)] = v;
                } else if v != 0.0 {
                    return Err(LinearSolveError::CoupledBlocks {
                        row: start + r,
                        column: j,
                    });
                }
            }
        }
        let solution = block
            .lu()
            .solve(&rhs.rows(start, size))
            .filter(|s| s.iter().all(|v| v.is_finite()))
            .ok_or(LinearSolveError::Singular)?;
        x.rows_mut(start, size).copy_from(&solution);
    }
    Ok(x)
}

/// Forward Gauss-Seidel sweeps; rows with a zero diagonal are skipped.
pub fn gauss_seidel(matrix: &CsrMatrix<f64>, rhs: &DVector<f64>, x: &mut DVector<f64>, sweeps: usize) {
    for _ in 0..sweeps {
        for i in 0..rhs.len() {
            let row = matrix.row(i);
            let (mut diagonal, mut off_diagonal) = (0.0, 0.0);
            for (&j, &v) in row.col_indices().iter().zip(row.values()) {
                if j == i {
                    diagonal += v;
                } else {
                    off_diagonal += v * x[j];
                }
            }
            if diagonal != 0.0 {
                x[i] = (rhs[i] - off_diagonal) / diagonal;
            }
        }
    }
}
