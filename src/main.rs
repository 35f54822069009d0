#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webreplay::errors::exit_code_for;
use webreplay::types::OutputFormat;
use webreplay::webdriver_manager::GLOBAL_DRIVER_MANAGER;

mod commands;

const EXIT_SUCCESS: i32 = 0;

#[derive(Parser)]
#[command(name = "webreplay")]
#[command(about = "Record browser interactions and replay them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Action store file (defaults to ~/.webreplay/store.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record interactions on a page until Ctrl-C or --duration
    Record {
        /// URL to start recording on
        url: String,

        /// Browser to use
        #[arg(short, long, default_value = "firefox")]
        browser: String,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Run browser in visible mode (disables headless)
        #[arg(long = "no-headless")]
        no_headless: bool,

        /// How often to collect events from the page, in milliseconds
        #[arg(long, default_value = "250")]
        poll_ms: u64,
    },

    /// Replay the recorded sequence
    Play {
        /// Browser to use
        #[arg(short, long, default_value = "firefox")]
        browser: String,

        /// Run browser in visible mode (disables headless)
        #[arg(long = "no-headless")]
        no_headless: bool,

        /// Delay between steps, in milliseconds
        #[arg(long, default_value = "500")]
        settle_ms: u64,

        /// Deadline for one action, in milliseconds
        #[arg(long, default_value = "30000")]
        dispatch_timeout: u64,

        /// Attempts per action before it is skipped
        #[arg(long, default_value = "3")]
        attempts: u32,
    },

    /// Print the recorded sequence
    Actions {
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Discard the recorded sequence
    Clear,
}

#[tokio::main]
async fn main() {
    let result = run().await;

    // Always clean up WebDriver processes before exiting
    GLOBAL_DRIVER_MANAGER.stop_all();

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let exit_code = exit_code_for(&err);

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            // Also log to stderr for human reading
            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

async fn run() -> Result<()> {
    // Initialize tracing to stderr (so JSON output to stdout remains clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webreplay=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record {
            url,
            browser,
            duration,
            no_headless,
            poll_ms,
        } => {
            commands::record::handle_record(url, browser, duration, no_headless, poll_ms, cli.store)
                .await?
        }

        Commands::Play {
            browser,
            no_headless,
            settle_ms,
            dispatch_timeout,
            attempts,
        } => {
            commands::play::handle_play(
                browser,
                no_headless,
                settle_ms,
                dispatch_timeout,
                attempts,
                cli.store,
            )
            .await?
        }

        Commands::Actions { format } => commands::actions::handle_actions(format, cli.store).await?,

        Commands::Clear => commands::clear::handle_clear(cli.store).await?,
    }

    Ok(())
}
