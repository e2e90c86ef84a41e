//! `lexdin` command-line front end.
//!
//! # Responsibility
//! - Load `.env`, configuration and logging, then open and seed the store.
//! - Dispatch one subcommand over the core use-cases.
//!
//! # Invariants
//! - A missing `API_KEY` aborts before any command runs.
//! - Ctrl-C while the text service is working cancels only that request.

mod commands;

use clap::{Args, Parser, Subcommand};
use lexdin_core::{default_log_level, init_logging, AppConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lexdin", version, about = "Consulta y versionado de normativa universitaria")]
struct Cli {
    /// SQLite database file; created and seeded on first use
    #[arg(long, env = "LEXDIN_DB", default_value = "lexdin.db")]
    db: PathBuf,

    /// Directory for rolling log files; logging is off when unset
    #[arg(long, env = "LEXDIN_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "LEXDIN_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Default)]
pub(crate) struct Credentials {
    /// Username to sign in as; omit to browse anonymously
    #[arg(long)]
    user: Option<String>,

    #[arg(long, env = "LEXDIN_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List norms, optionally filtered by text
    List {
        #[arg(long, short, default_value = "")]
        query: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Show one norm, optionally at a past version
    Show {
        id: String,
        #[arg(long)]
        version: Option<u32>,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Apply a modifying norm to a target norm, producing a new version
    Apply {
        #[arg(long)]
        target: String,
        #[arg(long)]
        modifying: String,
        /// File holding the new consolidated text; defaults to the current text
        #[arg(long)]
        content_file: Option<PathBuf>,
        /// Submit without asking for confirmation
        #[arg(long)]
        yes: bool,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Talk to the legal assistant
    Chat,
    /// Web-grounded question with cited sources
    Search { query: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let log_dir = match std::path::absolute(log_dir) {
            Ok(path) => path,
            Err(err) => {
                eprintln!("error: invalid log directory: {err}");
                return ExitCode::from(2);
            }
        };
        if let Err(err) = init_logging(level, &log_dir.to_string_lossy(), true) {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    }

    let context = match commands::Context::open(&cli.db, config) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::List { query, credentials } => context.list(&credentials, &query),
        Command::Show {
            id,
            version,
            credentials,
        } => context.show(&credentials, &id, version),
        Command::Apply {
            target,
            modifying,
            content_file,
            yes,
            credentials,
        } => {
            context
                .apply(&credentials, &target, &modifying, content_file.as_deref(), yes)
                .await
        }
        Command::Chat => context.chat().await,
        Command::Search { query } => context.search(&query).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
