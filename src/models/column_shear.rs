//! First-order stress balance restricted to vertical shear.
//!
//! Every map-plane node carries a column of `mz` nodes with two unknowns `(u, v)` each.
//! Columns interact only through the 2D data they read from their neighbors: the surface
//! gradient, the grounded fraction of the adjacent basal elements and the hydrostatic
//! imbalance on marine cliff faces. The vertical discretization uses linear elements on
//! the sigma grid; the Jacobian is obtained column by column with forward-mode AD.

use nalgebra::{DVector, Dyn, U1};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use num_dual::{Derivative, DualDVec64, DualNum};
use serde::{Deserialize, Serialize};

use crate::discretization::vertical::sigma_levels;
use crate::fem::q1::{interpolate, shape, NODE_OFFSETS};
use crate::fem::quadrature::Quadrature;
use crate::numerics::hierarchy::GridLevel;
use crate::numerics::solver::PhysicsModel;
use crate::physics::node_type::{
    exterior_element, grounding_line, marine_boundary_face, partially_submerged_face,
    LateralFace, NodeType,
};
use crate::physics::parameters::{ParameterField, Parameters, PhysicalConstants, SECONDS_PER_YEAR};

/// Regularized pseudo-plastic sliding under grounded ice, linear drag under floating ice.
///
/// `tau_b = -tauc * u / (u_threshold^q * (|u|^2 + delta^2)^((1 - q) / 2))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlidingLaw {
    /// `q`; 1 is linear sliding, 0 is purely plastic.
    pub exponent: f64,
    pub threshold_velocity: f64,
    pub regularization: f64,
    pub floating_drag: f64,
}

impl Default for SlidingLaw {
    fn default() -> Self {
        Self {
            exponent: 0.25,
            threshold_velocity: 100.0 / SECONDS_PER_YEAR,
            regularization: 0.01 / SECONDS_PER_YEAR,
            floating_drag: 1e9,
        }
    }
}

impl SlidingLaw {
    /// Basal drag coefficient `beta` of a node, blended by its grounded fraction.
    pub fn drag<T: DualNum<f64>>(&self, tauc: f64, grounded_fraction: f64, speed_squared: T) -> T {
        let q = self.exponent;
        let delta_squared = T::from(self.regularization * self.regularization);
        let scale = T::from(grounded_fraction * tauc / self.threshold_velocity.powf(q));
        let grounded = (speed_squared + delta_squared).powf(0.5 * (q - 1.0)) * scale;
        grounded + T::from((1.0 - grounded_fraction) * self.floating_drag)
    }
}

/// Column data that does not depend on the unknowns.
#[derive(Debug, Clone, PartialEq)]
struct Column {
    active: bool,
    dz: f64,
    hardness: Vec<f64>,
    /// Right-hand side contributions, stored with the sign they enter the residual.
    load: Vec<f64>,
    grounded_fraction: f64,
    tauc: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnShearModel {
    pub constants: PhysicalConstants,
    pub sliding: SlidingLaw,
    pub glen_exponent: f64,
    pub min_thickness: f64,
    standard: Quadrature,
    fine: Quadrature,
}

impl ColumnShearModel {
    pub fn new(
        constants: PhysicalConstants,
        sliding: SlidingLaw,
        glen_exponent: f64,
        min_thickness: f64,
    ) -> Self {
        Self {
            constants,
            sliding,
            glen_exponent,
            min_thickness,
            standard: Quadrature::standard(),
            fine: Quadrature::fine(),
        }
    }

    fn is_active(&self, p: &Parameters) -> bool {
        p.node_type != NodeType::Exterior && p.thickness >= self.min_thickness
    }

    fn column(&self, level: &GridLevel, i: i32, j: i32) -> Column {
        let p = level.parameters[(i, j)];
        let mz = level.mz;
        let mut column = Column {
            active: self.is_active(&p),
            dz: p.thickness / (mz - 1) as f64,
            hardness: level.hardness[(i, j)].clone(),
            load: vec![0.0; 2 * mz],
            grounded_fraction: 0.0,
            tauc: p.tauc,
        };
        if !column.active {
            return column;
        }

        let gradient = surface_gradient(level, i, j);
        let driving = self.constants.rho_ice_g();
        for k in 0..mz {
            let w = if k == 0 || k + 1 == mz {
                0.5 * column.dz
            } else {
                column.dz
            };
            column.load[2 * k] = driving * gradient[0] * w;
            column.load[2 * k + 1] = driving * gradient[1] * w;
        }

        let cliff = self.lateral_load(level, i, j);
        for (load, c) in column.load.iter_mut().zip(cliff) {
            *load += c;
        }
        column.grounded_fraction = self.grounded_fraction(level, i, j);
        column
    }

    fn column_residual<T: DualNum<f64>>(&self, column: &Column, eps: f64, x: &[T]) -> Vec<T> {
        if !column.active {
            return x.to_vec();
        }

        let mz = column.hardness.len();
        let n = self.glen_exponent;
        let mut r: Vec<T> = column.load.iter().map(|&l| T::from(l)).collect();
        let inv_dz = T::from(1.0 / column.dz);

        for k in 0..mz - 1 {
            let u_z = (x[2 * k + 2].clone() - x[2 * k].clone()) * inv_dz.clone();
            let v_z = (x[2 * k + 3].clone() - x[2 * k + 1].clone()) * inv_dz.clone();
            let gamma = (u_z.clone() * u_z.clone() + v_z.clone() * v_z.clone()) * T::from(0.25)
                + T::from(eps);
            let hardness = 0.5 * (column.hardness[k] + column.hardness[k + 1]);
            let eta = gamma.powf((1.0 - n) / (2.0 * n)) * T::from(0.5 * hardness);

            let tau_u = eta.clone() * u_z;
            let tau_v = eta * v_z;
            r[2 * k] = r[2 * k].clone() - tau_u.clone();
            r[2 * k + 2] = r[2 * k + 2].clone() + tau_u;
            r[2 * k + 1] = r[2 * k + 1].clone() - tau_v.clone();
            r[2 * k + 3] = r[2 * k + 3].clone() + tau_v;
        }

        let (u_b, v_b) = (x[0].clone(), x[1].clone());
        let speed_squared = u_b.clone() * u_b.clone() + v_b.clone() * v_b.clone();
        let beta = self
            .sliding
            .drag(column.tauc, column.grounded_fraction, speed_squared);
        r[0] = r[0].clone() + beta.clone() * u_b;
        r[1] = r[1].clone() + beta * v_b;
        r
    }

    /// Fraction of the basal area around node `(i, j)` where the ice is grounded.
    pub fn grounded_fraction(&self, level: &GridLevel, i: i32, j: i32) -> f64 {
        let parameters = &level.parameters;
        let (mut grounded, mut total) = (0.0, 0.0);

        for (element, node) in adjacent_elements(parameters, i, j) {
            let floatation = element.map(|p| p.floatation);
            let rule = if grounding_line(&floatation) {
                &self.fine
            } else {
                &self.standard
            };
            for (point, w) in rule.iter() {
                let chi = shape(point[0], point[1])[node];
                total += w * chi;
                if interpolate(&floatation, point[0], point[1]) <= 0.0 {
                    grounded += w * chi;
                }
            }
        }

        if total > 0.0 {
            grounded / total
        } else if parameters[(i, j)].floatation <= 0.0 {
            1.0
        } else {
            0.0
        }
    }

    /// Net hydrostatic load on marine cliff faces next to node `(i, j)`, per unit map area.
    fn lateral_load(&self, level: &GridLevel, i: i32, j: i32) -> Vec<f64> {
        let mz = level.mz;
        let sigma = sigma_levels(mz);
        let grid = &level.grid;
        let (rho_i_g, rho_w_g) = (self.constants.rho_ice_g(), self.constants.rho_ocean_g());

        let mut load = vec![0.0; 2 * mz];
        let elements = adjacent_elements(&level.parameters, i, j);
        if elements.is_empty() {
            return load;
        }

        for (element, node) in &elements {
            for face in LateralFace::ALL {
                let [a, b] = face.nodes();
                if *node != a && *node != b {
                    continue;
                }
                let (pa, pb) = (element[a], element[b]);
                let node_type = [pa.node_type, pb.node_type, pb.node_type, pa.node_type];
                let bottom = [pa.bed, pb.bed, pb.bed, pa.bed];
                let sea = [pa.sea_level, pb.sea_level, pb.sea_level, pa.sea_level];
                if !marine_boundary_face(&node_type, &bottom, &sea) {
                    continue;
                }

                let normal = face.normal();
                let length = if normal[0] != 0.0 { grid.dy } else { grid.dx };
                let psi = |t: f64| if *node == a { 1.0 - t } else { t };

                for k in 0..mz - 1 {
                    let (s0, s1) = (sigma[k], sigma[k + 1]);
                    let z = [
                        pa.bed + s0 * pa.thickness,
                        pb.bed + s0 * pb.thickness,
                        pb.bed + s1 * pb.thickness,
                        pa.bed + s1 * pa.thickness,
                    ];
                    let rule = if partially_submerged_face(&z, &sea) {
                        &self.fine
                    } else {
                        &self.standard
                    };

                    for (point, w) in rule.iter() {
                        let (t, s) = (point[0], point[1]);
                        let lerp = |fa: f64, fb: f64| (1.0 - t) * fa + t * fb;
                        let (bed, thickness) = (lerp(pa.bed, pb.bed), lerp(pa.thickness, pb.thickness));
                        let sea_level = lerp(pa.sea_level, pb.sea_level);
                        let z = bed + thickness * (s0 + s * (s1 - s0));

                        let pressure =
                            rho_i_g * (bed + thickness - z) - rho_w_g * (sea_level - z).max(0.0);
                        let area = length * thickness * (s1 - s0);
                        let f = -pressure * psi(t) * area * w;
                        for c in 0..2 {
                            load[2 * k + c] += f * (1.0 - s) * normal[c];
                            load[2 * (k + 1) + c] += f * s * normal[c];
                        }
                    }
                }
            }
        }

        let node_area = elements.len() as f64 * grid.dx * grid.dy / 4.0;
        load.iter_mut().for_each(|l| *l /= node_area);
        load
    }

    /// Heat generated by sliding of the grounded part of a column with basal velocity
    /// `(u, v)`.
    pub fn basal_frictional_heating(&self, level: &GridLevel, i: i32, j: i32, u: f64, v: f64) -> f64 {
        let p = level.parameters[(i, j)];
        if !self.is_active(&p) {
            return 0.0;
        }
        let fraction = self.grounded_fraction(level, i, j);
        let speed_squared = u * u + v * v;
        fraction * self.sliding.drag(p.tauc, 1.0, speed_squared) * speed_squared
    }

    fn columns(&self, level: &GridLevel) -> Vec<Column> {
        level
            .columns()
            .map(|(i, j)| self.column(level, i, j))
            .collect()
    }
}

impl PhysicsModel for ColumnShearModel {
    fn num_variables(&self) -> usize {
        2
    }

    fn residual(&self, level: &GridLevel, eps: f64, x: &DVector<f64>) -> DVector<f64> {
        let m = 2 * level.mz;
        let mut residual = DVector::zeros(self.size(level));
        for (col, column) in self.columns(level).iter().enumerate() {
            let range = col * m..(col + 1) * m;
            let r = self.column_residual(column, eps, &x.as_slice()[range.clone()]);
            residual.as_mut_slice()[range].copy_from_slice(&r);
        }
        residual
    }

    fn residual_and_jacobian(
        &self,
        level: &GridLevel,
        eps: f64,
        x: &DVector<f64>,
    ) -> (DVector<f64>, CsrMatrix<f64>) {
        let m = 2 * level.mz;
        let n = self.size(level);
        let mut residual = DVector::zeros(n);
        let mut jacobian = CooMatrix::new(n, n);

        for (col, column) in self.columns(level).iter().enumerate() {
            let base = col * m;
            let seeded: Vec<DualDVec64> = (0..m)
                .map(|j| DualDVec64::new(x[base + j], Derivative::derivative_generic(Dyn(m), U1, j)))
                .collect();

            for (row, r) in self.column_residual(column, eps, &seeded).into_iter().enumerate() {
                residual[base + row] = r.re;
                let derivative = r.eps.unwrap_generic(Dyn(m), U1);
                // a node couples to both components of itself and its vertical neighbors
                let k = row / 2;
                for j in 2 * k.saturating_sub(1)..(2 * k + 4).min(m) {
                    jacobian.push(base + row, base + j, derivative[j]);
                }
            }
        }
        (residual, CsrMatrix::from(&jacobian))
    }
}

/// Non-exterior elements containing node `(i, j)`, with the node's index in each.
fn adjacent_elements(parameters: &ParameterField, i: i32, j: i32) -> Vec<([Parameters; 4], usize)> {
    NODE_OFFSETS
        .iter()
        .enumerate()
        .filter_map(|(node, &(di, dj))| {
            let element = element_parameters(parameters, i - di, j - dj)?;
            let node_type = element.map(|p| p.node_type);
            (!exterior_element(&node_type)).then_some((element, node))
        })
        .collect()
}

fn element_parameters(parameters: &ParameterField, i: i32, j: i32) -> Option<[Parameters; 4]> {
    let mut element = [Parameters::default(); 4];
    for (n, &(di, dj)) in NODE_OFFSETS.iter().enumerate() {
        element[n] = *parameters.get(i + di, j + dj)?;
    }
    Some(element)
}

/// Centered differences of the surface elevation over ice-covered neighbors, one-sided
/// next to the ice margin.
fn surface_gradient(level: &GridLevel, i: i32, j: i32) -> [f64; 2] {
    let parameters = &level.parameters;
    let surface = |i: i32, j: i32| {
        parameters
            .get(i, j)
            .filter(|p| p.node_type != NodeType::Exterior)
            .map(|p| p.surface())
    };
    let center = parameters[(i, j)].surface();
    let difference = |minus: Option<f64>, plus: Option<f64>, h: f64| match (minus, plus) {
        (Some(m), Some(p)) => (p - m) / (2.0 * h),
        (Some(m), None) => (center - m) / h,
        (None, Some(p)) => (p - center) / h,
        (None, None) => 0.0,
    };
    [
        difference(surface(i - 1, j), surface(i + 1, j), level.grid.dx),
        difference(surface(i, j - 1), surface(i, j + 1), level.grid.dy),
    ]
}
