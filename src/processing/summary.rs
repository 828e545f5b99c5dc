use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use log::info;

use crate::config::BlatterConfig;
use crate::numerics::continuation::ContinuationStep;
use crate::physics::parameters::SECONDS_PER_YEAR;
use crate::stressbalance::StressBalanceOutput;

pub struct RunSummary {
    // Grid
    pub mx: usize,
    pub my: usize,
    pub mz: usize,
    pub mg_levels: usize,
    pub coarsening_factor: usize,

    // Regularization
    pub eps_target: f64,

    // Continuation
    pub steps: Vec<ContinuationStep>,
    pub nonlinear_iterations: u32,
    pub linear_iterations: u32,

    // Results, m/year
    pub max_speed: f64,
    pub max_basal_speed: f64,
    pub wall_time: Duration,
}

impl RunSummary {
    pub fn from_run(config: &BlatterConfig, output: &StressBalanceOutput, wall_time: Duration) -> Self {
        let speed = |v: &[f64; 2]| v[0].hypot(v[1]) * SECONDS_PER_YEAR;
        let max_of = |field: &crate::discretization::NodeField<[f64; 2]>| {
            field
                .owned_indices()
                .map(|n| speed(&field[n]))
                .fold(0.0, f64::max)
        };

        Self {
            mx: config.grid.mx,
            my: config.grid.my,
            mz: config.mz,
            mg_levels: config.newton.mg_levels,
            coarsening_factor: config.coarsening_factor,
            eps_target: config.eps_target(),
            steps: output.report.steps.clone(),
            nonlinear_iterations: output.report.nonlinear_iterations,
            linear_iterations: output.report.linear_iterations,
            max_speed: max_of(&output.velocity),
            max_basal_speed: max_of(&output.basal_velocity),
            wall_time,
        }
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;

        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file, "BLATTER STRESS BALANCE SUMMARY")?;
        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file)?;

        writeln!(file, "GRID")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Map plane:           {} x {}", self.mx, self.my)?;
        writeln!(file, "Vertical levels:     {}", self.mz)?;
        writeln!(
            file,
            "Multigrid:           {} level(s), coarsening factor {}",
            self.mg_levels, self.coarsening_factor
        )?;
        writeln!(file, "Target eps:          {:.6e} s-2", self.eps_target)?;
        writeln!(file)?;

        writeln!(file, "PARAMETER CONTINUATION")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(
            file,
            "{:>4}  {:>9}  {:>12}  {:>26}  {:>5}  {:>6}  {:>9}",
            "step", "lambda", "eps", "reason", "its", "linear", "delta"
        )?;
        for step in &self.steps {
            writeln!(
                file,
                "{:>4}  {:>9.6}  {:>12.4e}  {:>26}  {:>5}  {:>6}  {:>9.6}",
                step.step,
                step.lambda,
                step.eps,
                step.reason.to_string(),
                step.iterations,
                step.linear_iterations,
                step.delta
            )?;
        }
        writeln!(file, "Nonlinear iterations: {}", self.nonlinear_iterations)?;
        writeln!(file, "Linear iterations:    {}", self.linear_iterations)?;
        writeln!(file)?;

        writeln!(file, "RESULTS")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Max column-averaged speed: {:.3} m/year", self.max_speed)?;
        writeln!(file, "Max basal speed:           {:.3} m/year", self.max_basal_speed)?;
        writeln!(file, "Wall time:                 {:.3} s", self.wall_time.as_secs_f64())?;
        writeln!(file, "{}", "=".repeat(60))?;

        Ok(())
    }

    pub fn log_summary(&self) {
        info!("{}", "=".repeat(60));
        info!("Grid:          {} x {} x {}", self.mx, self.my, self.mz);
        info!(
            "Continuation:  {} step(s), {} nonlinear, {} linear iterations",
            self.steps.len(),
            self.nonlinear_iterations,
            self.linear_iterations
        );
        info!("Max speed:     {:.3} m/year", self.max_speed);
        info!("{}", "=".repeat(60));
    }
}
