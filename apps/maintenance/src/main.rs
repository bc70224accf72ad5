use std::process::ExitCode;

use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::Cli;
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    // Loading Env Vars
    dotenv().ok();

    // Logs go to stderr; stdout carries the operator report
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    info!("Running clinic maintenance command: {}", cli.command.name());

    // rusqlite blocks, so the whole run happens on the blocking pool
    let outcome = tokio::task::spawn_blocking(move || commands::run(&config, cli.command)).await;

    match outcome {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            error!("{}", err);
            eprintln!("error: {}", err);
            ExitCode::from(err.exit_code())
        }
        Err(join_err) => {
            error!("Maintenance task aborted: {}", join_err);
            ExitCode::FAILURE
        }
    }
}
