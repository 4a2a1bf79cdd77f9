pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "devkart",
    about = "Devkart operator CLI",
    long_about = "Inspect configuration, run readiness checks, and replay recorded backend \
                  message scripts against the cart pipeline.",
    after_help = "Examples:\n  devkart doctor --json\n  devkart config\n  devkart replay session.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, llm key readiness, and monitoring readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Replay a recorded backend message script through the cart pipeline (offline)"
    )]
    Replay {
        #[arg(help = "Path to a JSON file holding an array of raw backend messages")]
        script: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Replay { script } => commands::replay::run(&script),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
