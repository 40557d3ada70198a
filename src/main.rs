use crate::cli::Args;
use crate::config::Config;
use crate::logging::setup_logging;
use crate::probe::{PgVersionSource, ProbeError};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

mod cli;
mod config;
mod logging;
mod probe;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config before logging setup so startup logs are never silently dropped
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            let e = ProbeError::Other(anyhow::Error::new(e));
            println!("{e}");
            return ExitCode::from(3);
        }
    };
    setup_logging(&config, args.tracing);

    // Descriptor check happens before any connection attempt
    if !config.has_database_url() {
        println!("DATABASE_URL environment variable is not set.");
        return ExitCode::from(1);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        "starting pgprobe"
    );

    let outcome = async {
        let mut source = PgVersionSource::connect(&config).await?;
        probe::run(&mut source).await
    }
    .await;

    match outcome {
        Ok(report) => {
            println!("{}", report.render());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "probe failed");
            println!("{e}");
            match e {
                ProbeError::Database(_) => ExitCode::from(2),
                ProbeError::EmptyResult | ProbeError::Other(_) => ExitCode::from(3),
            }
        }
    }
}
