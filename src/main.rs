use std::error::Error;
use std::fs;
use std::io::Write;
use std::time::Instant;

use blatter_rs::models::setups::MarineIceSheet;
use blatter_rs::processing::csv_writer;
use blatter_rs::processing::summary::RunSummary;
use blatter_rs::{Blatter, BlatterConfig};
use env_logger::{Builder, Target};
use log::{info, LevelFilter};

const OUTPUT_DIR: &str = "output/main";

fn init_logging() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    Builder::new()
        .filter_level(level)
        .target(Target::Stdout)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .init();
}

/// Usage: `blatter-rs [config.toml]`
fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    fs::create_dir_all(OUTPUT_DIR)?;

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("reading configuration from {path}");
            BlatterConfig::from_file(path)?
        }
        None => BlatterConfig::default(),
    };

    let mut blatter = Blatter::from_config(config)?;
    blatter.init(None)?;
    let inputs = MarineIceSheet::default().inputs(blatter.grid());

    let start = Instant::now();
    let output = blatter.update(&inputs)?;
    let wall_time = start.elapsed();

    csv_writer::write_map_plane(format!("{OUTPUT_DIR}/velocity.csv"), blatter.grid(), &output)?;
    let center = (0, (blatter.grid().my / 2) as i32);
    csv_writer::write_profile(
        format!("{OUTPUT_DIR}/profile.csv"),
        blatter.velocity_u_sigma(),
        blatter.velocity_v_sigma(),
        center,
    )?;
    blatter
        .restart_record()
        .save(format!("{OUTPUT_DIR}/restart.json"))?;
    info!("results saved to {OUTPUT_DIR}");

    let summary = RunSummary::from_run(blatter.config(), &output, wall_time);
    summary.write_to_file(format!("{OUTPUT_DIR}/summary.txt"))?;
    summary.log_summary();
    Ok(())
}
