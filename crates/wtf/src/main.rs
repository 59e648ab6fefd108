//! wtf - ask a SQLite database questions in plain language

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{init_command, setup_command, sql_command, status_command, SqlArgs};

/// wtf - ask your data what happened
#[derive(Parser)]
#[command(name = "wtf")]
#[command(about = "◆ Ask a SQLite database questions in plain language")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a SQLite database until a query answers the request
    Sql {
        /// Database file, opened read-only
        #[arg(long)]
        db: PathBuf,
        /// Run every proposed query without asking
        #[arg(short, long)]
        yes: bool,
        /// Log prompts, completions and results to stderr
        #[arg(short, long)]
        debug: bool,
        /// Primary model (aliases: gpt3, instruct, davinci, codex)
        #[arg(short, long)]
        model: Option<String>,
        /// Write the session transcript as JSON
        #[arg(long)]
        transcript: Option<PathBuf>,
        /// What you want to know
        #[arg(required = true)]
        request: Vec<String>,
    },
    /// Initialize config
    Init,
    /// Show configuration status
    Status,
    /// Interactive setup wizard
    Setup,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(matches!(cli.command, Commands::Sql { debug: true, .. }));

    let result = match cli.command {
        Commands::Sql {
            db,
            yes,
            debug: _,
            model,
            transcript,
            request,
        } => {
            sql_command(SqlArgs {
                db,
                yes,
                model,
                transcript,
                request,
            })
            .await
        }
        Commands::Init => init_command().await,
        Commands::Status => status_command().await,
        Commands::Setup => setup_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("◆ {:#}", e);
        std::process::exit(1);
    }
}
