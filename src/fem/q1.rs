//! Bilinear (Q1) shape functions on the reference square `[0, 1]^2`.
//!
//! Element nodes are ordered `(i, j), (i + 1, j), (i + 1, j + 1), (i, j + 1)`.

/// Offsets of the element nodes from the lower-left node.
pub const NODE_OFFSETS: [(i32, i32); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];

pub fn shape(xi: f64, eta: f64) -> [f64; 4] {
    [
        (1.0 - xi) * (1.0 - eta),
        xi * (1.0 - eta),
        xi * eta,
        (1.0 - xi) * eta,
    ]
}

pub fn interpolate(values: &[f64; 4], xi: f64, eta: f64) -> f64 {
    shape(xi, eta)
        .iter()
        .zip(values)
        .map(|(chi, v)| chi * v)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_of_unity_and_nodal_values() {
        let chi = shape(0.3, 0.8);
        assert!((chi.iter().sum::<f64>() - 1.0).abs() < 1e-15);

        let values = [1.0, 2.0, 4.0, 3.0];
        for (k, (di, dj)) in NODE_OFFSETS.iter().enumerate() {
            assert_eq!(interpolate(&values, *di as f64, *dj as f64), values[k]);
        }
        assert_eq!(interpolate(&values, 0.5, 0.5), 2.5);
    }
}
