use approx::assert_relative_eq;

use blatter_rs::discretization::vertical::sigma_levels;
use blatter_rs::discretization::Periodicity;
use blatter_rs::models::column_shear::SlidingLaw;
use blatter_rs::models::setups::Slab;
use blatter_rs::physics::flow_law::{FlowLawConfig, IsothermalGlen};
use blatter_rs::physics::parameters::SECONDS_PER_YEAR;
use blatter_rs::{Blatter, BlatterConfig};

const TAUC: f64 = 1e5;

fn config(exponent: f64, hardness: f64, mz: usize) -> BlatterConfig {
    let mut config = BlatterConfig::default();
    config.grid.mx = 5;
    config.grid.my = 3;
    config.grid.dx = 1e3;
    config.grid.dy = 1e3;
    config.grid.periodicity = Periodicity::None;
    config.mz = mz;
    config.coarsening_factor = 2;
    config.newton.mg_levels = 2;
    config.flow_law = FlowLawConfig::Isothermal(IsothermalGlen { exponent, hardness });
    config.sliding = SlidingLaw {
        exponent: 1.0,
        ..SlidingLaw::default()
    };
    config
}

/// Basal velocity of a slab with linear sliding: `tau_b / beta`.
fn basal_speed(config: &BlatterConfig, slab: &Slab) -> f64 {
    let driving = config.constants.rho_ice_g() * slab.thickness * slab.slope;
    driving * config.sliding.threshold_velocity / TAUC
}

#[test]
fn newtonian_slab_matches_the_analytic_profile() {
    let (hardness, mz) = (2e13, 5);
    let config = config(1.0, hardness, mz);
    let slab = Slab {
        tauc: TAUC,
        ..Slab::default()
    };

    let mut blatter = Blatter::from_config(config).unwrap();
    blatter.init(None).unwrap();
    let output = blatter.update(&slab.inputs(blatter.grid())).unwrap();
    assert_eq!(output.report.steps.len(), 1);

    let h = slab.thickness;
    let rho_g = config.constants.rho_ice_g();
    let u_b = basal_speed(&config, &slab);
    let shear = 2.0 * rho_g * slab.slope / hardness;
    let exact: Vec<f64> = sigma_levels(mz)
        .iter()
        .map(|s| {
            let z = s * h;
            u_b + shear * (h * z - 0.5 * z * z)
        })
        .collect();

    let u_sigma = blatter.velocity_u_sigma();
    let v_sigma = blatter.velocity_v_sigma();
    for n in u_sigma.owned_indices() {
        for (k, u) in u_sigma[n].iter().enumerate() {
            assert_relative_eq!(*u, exact[k], max_relative = 1e-6);
        }
        assert!(v_sigma[n].iter().all(|v| v.abs() < 1e-6 * u_b));

        assert_relative_eq!(output.basal_velocity[n][0], u_b, max_relative = 1e-6);
        assert_relative_eq!(
            output.basal_frictional_heating[n],
            rho_g * h * slab.slope * u_b,
            max_relative = 1e-6
        );
    }

    // sliding plus a bit of deformation: between 5 and 50 m/year
    let average = output.velocity[(2, 1)][0] * SECONDS_PER_YEAR;
    assert!(average > u_b * SECONDS_PER_YEAR && average < 50.0, "{average}");
}

#[test]
fn glen_slab_converges_to_the_power_law_profile() {
    let (hardness, mz) = (1.9e8, 9);
    let config = config(3.0, hardness, mz);
    let slab = Slab {
        slope: 1e-2,
        tauc: TAUC,
        ..Slab::default()
    };

    let mut blatter = Blatter::from_config(config).unwrap();
    let output = blatter.update(&slab.inputs(blatter.grid())).unwrap();
    assert!(output.report.nonlinear_iterations > 1);

    let h = slab.thickness;
    let softness = hardness.powi(-3);
    let driving = config.constants.rho_ice_g() * slab.slope;
    let u_b = basal_speed(&config, &slab);
    let deformation = 0.5 * softness * driving.powi(3) * h.powi(4);

    let surface = blatter.velocity_u_sigma()[(2, 1)][mz - 1];
    assert_relative_eq!(output.basal_velocity[(2, 1)][0], u_b, max_relative = 1e-6);
    assert_relative_eq!(surface - u_b, deformation, max_relative = 2e-2);
}

#[test]
fn solution_is_kept_for_restarts() {
    let config = config(1.0, 2e13, 5);
    let mut blatter = Blatter::from_config(config).unwrap();
    blatter.update(&Slab::default().inputs(blatter.grid())).unwrap();

    let record = blatter.restart_record();
    let mut restarted = Blatter::from_config(config).unwrap();
    restarted.init(Some(&record)).unwrap();
    assert_eq!(restarted.velocity_u_sigma(), blatter.velocity_u_sigma());
    assert_eq!(restarted.velocity_v_sigma(), blatter.velocity_v_sigma());
}
