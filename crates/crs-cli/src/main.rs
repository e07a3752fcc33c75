//! `crs` – operator shell for the toolpath sequencer.
//!
//! 1. Initialises tracing (`RUST_LOG`, `CRS_LOG_FORMAT`, optional OTLP).
//! 2. Loads `~/.crs/config.toml`, writing the defaults on first run.
//! 3. Starts a simulated cell: static transform tree, JSON toolpath loader,
//!    in-process planner, robot-state feed and playback to the event bus.
//! 4. Drops the user into a REPL where `/trigger` runs one cycle.
//! 5. Intercepts **Ctrl-C** and exits once the current prompt returns.

mod cell;
mod config;
mod repl;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, warn};

use crs_runtime::telemetry::{TelemetryConfig, init_tracing};

fn main() -> ExitCode {
    let _telemetry = init_tracing(&TelemetryConfig::from_env("crs"));

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => first_run(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("crs-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::FAILURE;
        }
    };
    let enter = runtime.enter();

    let mut cell = cell::Cell::start(&cfg);
    cell.spawn_console();

    println!(
        "  Toolpath {} in frame {} → {}",
        cfg.toolpath_file.bold(),
        cfg.toolpath_frame.yellow(),
        cfg.world_frame.yellow()
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(&cell, &cfg, shutdown);

    drop(cell);
    drop(enter);
    runtime.shutdown_timeout(Duration::from_millis(500));
    ExitCode::SUCCESS
}

fn first_run() -> config::Config {
    let mut cfg = config::Config::default();
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} Default config written to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

fn print_banner() {
    println!();
    println!("{}", "   ___________  ____".bold().cyan());
    println!("{}", "  / ___/ ___/ |/ __/".bold().cyan());
    println!("{}", " / /__/ /  _\\ \\_\\ \\ ".bold().cyan());
    println!("{}", " \\___/_/  /___/___/ ".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "crs".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Toolpath transformation & trajectory playback");
    println!();
}
