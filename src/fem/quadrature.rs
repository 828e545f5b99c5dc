//! Tensor-product Gauss-Legendre rules on the unit square.

use std::f64::consts::PI;

/// Points in `[0, 1]^2` and weights summing to one.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadrature {
    pub points: Vec<[f64; 2]>,
    pub weights: Vec<f64>,
}

impl Quadrature {
    /// `n x n` Gauss-Legendre rule.
    pub fn gauss(n: usize) -> Self {
        let (x, w) = gauss_legendre(n);
        let mut points = Vec::with_capacity(n * n);
        let mut weights = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                points.push([0.5 * (x[i] + 1.0), 0.5 * (x[j] + 1.0)]);
                weights.push(0.25 * w[i] * w[j]);
            }
        }
        Self { points, weights }
    }

    /// Rule used on most elements and faces.
    pub fn standard() -> Self {
        Self::gauss(2)
    }

    /// Rule used where a discontinuity crosses the element or face.
    pub fn fine() -> Self {
        Self::gauss(10)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f64; 2], f64)> {
        self.points.iter().zip(self.weights.iter().copied())
    }
}

/// Nodes and weights of the `n`-point Gauss-Legendre rule on `[-1, 1]`.
///
/// Newton iteration on `P_n` starting from Chebyshev nodes.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];

    for k in 0..n {
        let mut x = -(PI * (k as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..100 {
            let (p, d) = legendre_and_derivative(n, x);
            dp = d;
            let update = p / d;
            x -= update;
            if update.abs() < 1e-15 {
                break;
            }
        }
        nodes[k] = x;
        weights[k] = 2.0 / ((1.0 - x * x) * dp * dp);
    }
    (nodes, weights)
}

fn legendre_and_derivative(n: usize, x: f64) -> (f64, f64) {
    let (mut p0, mut p1) = (1.0, x);
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let n = n as f64;
    (p1, n * (x * p1 - p0) / (x * x - 1.0))
}
