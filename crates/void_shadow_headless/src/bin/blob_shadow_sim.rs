//! Blob shadow simulation
//!
//! Usage: `blob-shadow-sim [config.json]`
//!
//! Simulates a bobbing character with one shadow caster on the headless host
//! and prints a JSON summary of the run.

use std::process::ExitCode;

use void_shadow_headless::{SimConfig, Simulation};

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let config = match std::env::args().nth(1) {
        Some(path) => match load_config(&path) {
            Ok(config) => {
                log::info!("Loaded simulation config from {}", path);
                config
            }
            Err(e) => {
                log::error!("Failed to load config from {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            log::info!("No config given, using defaults");
            SimConfig::default()
        }
    };

    log::info!(
        "Simulating {} frames (texture {}px, lightness {:.2}, casting distance {:.1})",
        config.frames,
        config.caster.texture_size,
        config.caster.lightness,
        config.caster.casting_distance
    );

    let simulation = match Simulation::new(config) {
        Ok(simulation) => simulation,
        Err(e) => {
            log::error!("Failed to start shadow caster: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let summary = simulation.run();
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => log::warn!("Failed to serialize summary: {}", e),
    }

    if summary.live_targets != 0 || summary.immediate_violations != 0 {
        log::error!(
            "Run finished unclean: {} live targets, {} immediate-mode violations",
            summary.live_targets,
            summary.immediate_violations
        );
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn load_config(path: &str) -> Result<SimConfig, String> {
    let json = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    SimConfig::from_json(&json).map_err(|e| e.to_string())
}
