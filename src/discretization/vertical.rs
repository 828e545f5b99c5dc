use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VerticalGridError {
    #[error("the vertical grid needs at least 2 levels (got Mz = {0})")]
    TooFewLevels(usize),
    #[error("the coarsening factor has to be at least 2 (got {0})")]
    CoarseningFactor(usize),
    #[error("at least one multigrid level is required")]
    NoLevels,
    #[error(
        "Mz = {mz}, coarsening factor {factor} and {levels} multigrid levels are not compatible. \
         To use N = {levels} multigrid levels with the coarsening factor C = {factor} Mz has to be \
         equal to A * C^(N - 1) + 1 for some positive integer A, e.g. {}, {}, {}, ...",
        .examples[0], .examples[1], .examples[2]
    )]
    Incompatible {
        mz: usize,
        factor: usize,
        levels: usize,
        examples: [usize; 3],
    },
}

/// Normalized vertical coordinates of `mz` equally spaced levels; the last one is exactly 1.
pub fn sigma_levels(mz: usize) -> Vec<f64> {
    let n = mz.saturating_sub(1).max(1) as f64;
    (0..mz)
        .map(|k| if k + 1 == mz { 1.0 } else { k as f64 / n })
        .collect()
}

pub fn coarse_mz(mz: usize, factor: usize) -> usize {
    (mz - 1) / factor + 1
}

/// Number of vertical levels at every multigrid level, finest first.
///
/// Fails unless `mz - 1` is divisible by `factor` at each of the `levels - 1` coarsenings.
pub fn check_coarsening(
    mz: usize,
    levels: usize,
    factor: usize,
) -> Result<Vec<usize>, VerticalGridError> {
    if mz < 2 {
        return Err(VerticalGridError::TooFewLevels(mz));
    }
    if levels == 0 {
        return Err(VerticalGridError::NoLevels);
    }
    if levels > 1 && factor < 2 {
        return Err(VerticalGridError::CoarseningFactor(factor));
    }

    let mut result = vec![mz];
    let mut current = mz;
    for _ in 1..levels {
        if (current - 1) % factor != 0 {
            let n = factor.pow(levels as u32 - 1);
            return Err(VerticalGridError::Incompatible {
                mz,
                factor,
                levels,
                examples: [n + 1, 2 * n + 1, 3 * n + 1],
            });
        }
        current = coarse_mz(current, factor);
        result.push(current);
    }
    Ok(result)
}
