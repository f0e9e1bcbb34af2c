//! QueueCTL CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::Cli;

/// Exit code for a missing job or DLQ entry.
const EXIT_NOT_FOUND: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level())),
        )
        .with_target(false)
        .init();

    if let Err(e) = cli.execute().await {
        output::print_error(&e.message);
        let code = if e.is_not_found() { EXIT_NOT_FOUND } else { 1 };
        std::process::exit(code);
    }
}
