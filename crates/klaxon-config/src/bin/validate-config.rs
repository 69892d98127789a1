//! Config validation CLI tool
//!
//! Validates a klaxond configuration file and reports any errors.

use klaxon_config::{CURRENT_CONFIG_VERSION, ConfigError};
use klaxon_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a klaxond configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match klaxon_config::load_config(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Socket: {}", config.daemon.socket_path.display());
            println!("  Data dir: {}", config.daemon.data_dir.display());
            println!("  Tick interval: {}ms", config.daemon.tick_interval.as_millis());
            println!("  Default snooze: {}", format_duration(config.defaults.snooze));
            println!("  Preset alarms: {}", config.alarms.len());

            if !config.alarms.is_empty() {
                println!();
                println!("Alarms:");
                for preset in &config.alarms {
                    println!(
                        "  - {} [{}] {}{}",
                        preset.label,
                        preset.kind.summary(),
                        preset.kind.describe_time(),
                        if preset.enabled { "" } else { " (disabled)" }
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
