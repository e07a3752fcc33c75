//! REPL – operator shell for the sanding cell.
//!
//! Supported slash-commands:
//!   /trigger | /t  – start a planning cycle
//!   /status        – current cycle state
//!   /robot         – latest robot joint state
//!   /frames        – frames known to the transform tree
//!   /config        – effective configuration
//!   /help          – show this list
//!   /quit | /exit  – leave the shell

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cell::Cell;
use crate::config::{self, Config};

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Trigger,
    Status,
    Robot,
    Frames,
    Config,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let cmd = line.trim();
        if cmd.is_empty() {
            return None;
        }
        Some(match cmd {
            "/trigger" | "/t" => Command::Trigger,
            "/status" => Command::Status,
            "/robot" => Command::Robot,
            "/frames" => Command::Frames,
            "/config" => Command::Config,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        })
    }
}

/// Entry point for the interactive REPL.
///
/// Runs on the calling thread; the caller must have entered the Tokio
/// runtime.  `shutdown` is polled each iteration; when set the REPL exits.
pub fn run(cell: &Cell, cfg: &Config, shutdown: Arc<AtomicBool>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = match editor.readline(&format!("{} ", "crs>".bold().cyan())) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        let _ = editor.add_history_entry(line.trim());

        match command {
            Command::Trigger => cmd_trigger(cell),
            Command::Status => {
                println!("  Cycle state: {}", cell.orchestrator.state().to_string().yellow());
            }
            Command::Robot => cmd_robot(cell),
            Command::Frames => {
                println!("{}", "Frames".bold().underline());
                for frame in cell.frames() {
                    println!("    • {}", frame.bold());
                }
            }
            Command::Config => cmd_config(cfg),
            Command::Help => cmd_help(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Cell Commands".bold().underline());
    println!("  {}  – load, transform, plan and play the toolpath", "/trigger /t".bold().cyan());
    println!("  {}      – current cycle state", "/status".bold().cyan());
    println!("  {}       – latest robot joint state", "/robot".bold().cyan());
    println!("  {}      – frames in the transform tree", "/frames".bold().cyan());
    println!("  {}      – effective configuration", "/config".bold().cyan());
    println!("  {}  – exit the shell", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_trigger(cell: &Cell) {
    let response = cell.orchestrator.trigger();
    if response.success {
        println!("  {} {}", "✓".green().bold(), response.message);
    } else {
        println!("  {} {}", "✗".red().bold(), response.message.red());
    }
}

fn cmd_robot(cell: &Cell) {
    let state = cell.robot_state.snapshot();
    println!(
        "{} (version {})",
        "Robot State".bold().underline(),
        cell.robot_state.version()
    );
    if state.names.is_empty() {
        println!("  {}", "no joint state received yet".dimmed());
        return;
    }
    for (name, position) in state.names.iter().zip(&state.positions) {
        println!("    {:<12} {:>9.4}", name, position);
    }
}

fn cmd_config(cfg: &Config) {
    println!("{}", "Configuration".bold().underline());
    println!("  File           : {}", config::config_path().display().to_string().dimmed());
    println!("  Toolpath       : {} (frame {})", cfg.toolpath_file.yellow(), cfg.toolpath_frame);
    println!("  World frame    : {}", cfg.world_frame.yellow());
    println!(
        "  Tool           : {} @ {} m/s",
        cfg.tool.tool_link.yellow(),
        cfg.tool.tool_speed
    );
    println!(
        "  Playback       : {} ms/unit, settle {} units, {} points/unit",
        cfg.playback.unit_ms, cfg.playback.settle_units, cfg.playback.points_per_unit
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/trigger"), Some(Command::Trigger));
        assert_eq!(Command::parse("  /t  "), Some(Command::Trigger));
        assert_eq!(Command::parse("/status"), Some(Command::Status));
        assert_eq!(Command::parse("/robot"), Some(Command::Robot));
        assert_eq!(Command::parse("/frames"), Some(Command::Frames));
        assert_eq!(Command::parse("/config"), Some(Command::Config));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/exit"), Some(Command::Quit));
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn unknown_commands_are_kept_verbatim() {
        assert_eq!(
            Command::parse("/launch"),
            Some(Command::Unknown("/launch".to_string()))
        );
    }
}
