use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::discretization::{GridTopology, NodeField};
use crate::physics::parameters::SECONDS_PER_YEAR;
use crate::stressbalance::StressBalanceOutput;

/// Write equally long data columns to a CSV file with headers
pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], columns: &[Vec<f64>]) -> io::Result<()> {
    if headers.len() != columns.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                columns.len()
            ),
        ));
    }
    let n_rows = columns.first().map_or(0, Vec::len);
    if columns.iter().any(|c| c.len() != n_rows) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "data columns have different lengths",
        ));
    }

    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{}", headers.join(","))?;
    for i in 0..n_rows {
        let row: Vec<String> = columns.iter().map(|c| format!("{:.15e}", c[i])).collect();
        writeln!(file, "{}", row.join(","))?;
    }
    file.flush()
}

/// Map-plane results at the owned nodes, velocities in m/year
pub fn write_map_plane<P: AsRef<Path>>(
    path: P,
    grid: &GridTopology,
    output: &StressBalanceOutput,
) -> io::Result<()> {
    let nodes: Vec<(i32, i32)> = output.velocity.owned_indices().collect();
    let column = |f: &dyn Fn((i32, i32)) -> f64| nodes.iter().map(|&n| f(n)).collect::<Vec<f64>>();

    write_csv(
        path,
        &["x", "y", "u", "v", "u_base", "v_base", "basal_heating"],
        &[
            column(&|(i, _)| grid.x(i)),
            column(&|(_, j)| grid.y(j)),
            column(&|n| output.velocity[n][0] * SECONDS_PER_YEAR),
            column(&|n| output.velocity[n][1] * SECONDS_PER_YEAR),
            column(&|n| output.basal_velocity[n][0] * SECONDS_PER_YEAR),
            column(&|n| output.basal_velocity[n][1] * SECONDS_PER_YEAR),
            column(&|n| output.basal_frictional_heating[n]),
        ],
    )
}

/// Velocity profile of one column against the sigma coordinate, in m/year
pub fn write_profile<P: AsRef<Path>>(
    path: P,
    u_sigma: &NodeField<Vec<f64>>,
    v_sigma: &NodeField<Vec<f64>>,
    node: (i32, i32),
) -> io::Result<()> {
    let (u, v) = (&u_sigma[node], &v_sigma[node]);
    let mz = u.len();
    let sigma = crate::discretization::vertical::sigma_levels(mz);
    let to_year = |c: &Vec<f64>| c.iter().map(|x| x * SECONDS_PER_YEAR).collect::<Vec<_>>();
    write_csv(path, &["sigma", "u", "v"], &[sigma, to_year(u), to_year(v)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::Periodicity;
    use std::fs;

    #[test]
    fn test_write_csv() {
        let path = std::env::temp_dir().join("blatter_csv_writer.csv");
        let data = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        write_csv(&path, &["a", "b"], &data).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "a,b");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("2.000000000000000e0,"));
        fs::remove_file(&path).ok();

        assert!(write_csv(&path, &["a"], &data).is_err());
        assert!(write_csv(&path, &["a", "b"], &[vec![1.0], vec![]]).is_err());
    }

    #[test]
    fn profile_has_one_row_per_level() {
        let grid = GridTopology::serial(2, 2, 1.0, 1.0, Periodicity::None).unwrap();
        let u = NodeField::new(&grid, vec![0.0, 1.0 / SECONDS_PER_YEAR, 2.0 / SECONDS_PER_YEAR]);
        let path = std::env::temp_dir().join("blatter_profile.csv");
        write_profile(&path, &u, &u, (1, 1)).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(content.lines().count(), 4);
        assert!(content.lines().nth(2).unwrap().starts_with("5.000000000000000e-1,"));
    }
}
