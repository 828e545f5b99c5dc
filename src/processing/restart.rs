//! Velocity on the sigma grid, saved between runs and used as the initial guess.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discretization::{GridTopology, NodeField};

#[derive(Debug, Error)]
pub enum RestartError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("cannot parse the restart file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("uvel_sigma and vvel_sigma not found")]
    Missing,
    #[error("restart data has shape {found:?}, expected {expected:?}")]
    Shape {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },
}

/// Velocity components of the whole domain, stored column by column with `i` fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartRecord {
    pub mx: usize,
    pub my: usize,
    pub mz: usize,
    #[serde(default)]
    pub uvel_sigma: Option<Vec<f64>>,
    #[serde(default)]
    pub vvel_sigma: Option<Vec<f64>>,
}

impl RestartRecord {
    pub fn new(mx: usize, my: usize, mz: usize) -> Self {
        let n = mx * my * mz;
        Self {
            mx,
            my,
            mz,
            uvel_sigma: Some(vec![0.0; n]),
            vvel_sigma: Some(vec![0.0; n]),
        }
    }

    /// Copies the owned columns of one rank into the record.
    pub fn insert(&mut self, u: &NodeField<Vec<f64>>, v: &NodeField<Vec<f64>>) {
        let (mx, my, mz) = (self.mx, self.my, self.mz);
        let targets = [(&mut self.uvel_sigma, u), (&mut self.vvel_sigma, v)];
        for (target, field) in targets {
            let values = target.get_or_insert_with(|| vec![0.0; mx * my * mz]);
            for (i, j) in field.owned_indices() {
                let offset = (j as usize * mx + i as usize) * mz;
                values[offset..offset + mz].copy_from_slice(&field[(i, j)]);
            }
        }
    }

    /// Velocity columns of the nodes owned by `grid`.
    pub fn velocity(
        &self,
        grid: &GridTopology,
        mz: usize,
    ) -> Result<(NodeField<Vec<f64>>, NodeField<Vec<f64>>), RestartError> {
        let (Some(u), Some(v)) = (&self.uvel_sigma, &self.vvel_sigma) else {
            return Err(RestartError::Missing);
        };
        let expected = (grid.mx, grid.my, mz);
        let found = (self.mx, self.my, self.mz);
        let n = grid.mx * grid.my * mz;
        if found != expected || u.len() != n || v.len() != n {
            return Err(RestartError::Shape { expected, found });
        }

        let column = |values: &[f64], i: usize, j: usize| {
            let offset = (j * grid.mx + i) * mz;
            values[offset..offset + mz].to_vec()
        };
        Ok((
            NodeField::from_global_fn(grid, |i, j| column(u, i, j)),
            NodeField::from_global_fn(grid, |i, j| column(v, i, j)),
        ))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RestartError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RestartError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::Periodicity;
    use std::fs;

    #[test]
    fn save_and_load_keep_the_columns() {
        let grid = GridTopology::serial(4, 3, 1.0, 1.0, Periodicity::None).unwrap();
        let u = NodeField::from_global_fn(&grid, |i, j| vec![i as f64, j as f64]);
        let v = u.map(|c| c.iter().map(|x| -x).collect::<Vec<_>>());
        let mut record = RestartRecord::new(4, 3, 2);
        record.insert(&u, &v);

        let path = std::env::temp_dir().join("blatter_restart_roundtrip.json");
        record.save(&path).unwrap();
        let loaded = RestartRecord::load(&path).unwrap();
        fs::remove_file(&path).ok();

        let (u2, v2) = loaded.velocity(&grid, 2).unwrap();
        assert_eq!(u2[(3, 2)], vec![3.0, 2.0]);
        assert_eq!(v2[(1, 2)], vec![-1.0, -2.0]);
    }

    #[test]
    fn missing_variables_and_shape_mismatches_are_errors() {
        let grid = GridTopology::serial(4, 3, 1.0, 1.0, Periodicity::None).unwrap();
        let record: RestartRecord =
            serde_json::from_str(r#"{"mx": 4, "my": 3, "mz": 2, "uvel_sigma": [0.0]}"#).unwrap();
        let error = record.velocity(&grid, 2).unwrap_err();
        assert!(matches!(error, RestartError::Missing));
        assert_eq!(error.to_string(), "uvel_sigma and vvel_sigma not found");

        let record = RestartRecord::new(4, 3, 2);
        assert!(matches!(
            record.velocity(&grid, 3),
            Err(RestartError::Shape { .. })
        ));
    }
}
