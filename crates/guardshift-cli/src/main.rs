use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;

use app::{App, GlobalOpts};

#[derive(Parser)]
#[command(name = "guardshift", version, about = "Guard shift attendance CLI")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign out and session status
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Shift lists, check-in and check-out
    Shift {
        #[command(subcommand)]
        action: commands::shift::ShiftAction,
    },
    /// Breaks under the active shift
    Break {
        #[command(subcommand)]
        action: commands::breaks::BreakAction,
    },
    /// Attendance statistics
    Stats(commands::stats::StatsArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GUARDSHIFT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = cli.opts;
    let result = match cli.command {
        Commands::Session { action } => {
            App::load(opts).and_then(|app| commands::session::run(action, &app))
        }
        Commands::Shift { action } => {
            App::load(opts).and_then(|app| commands::shift::run(action, &app))
        }
        Commands::Break { action } => {
            App::load(opts).and_then(|app| commands::breaks::run(action, &app))
        }
        Commands::Stats(args) => App::load(opts).and_then(|app| commands::stats::run(args, &app)),
        Commands::Config { action } => commands::config::run(action, opts.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
