use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::filter::EnvFilter;

use garmin_notion_sync::common::config::Config;
use garmin_notion_sync::common::garmin_client::GarminClient;
use garmin_notion_sync::common::notion_client::NotionClient;

mod check;
mod cli;
mod daily_sync;

use crate::cli::{Cli, Commands, SyncArgs};
use crate::daily_sync::DailySync;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.debug);

    match args.command {
        Some(Commands::Check) => check::run_check(&config).await,
        Some(Commands::Sync(sync_args)) => run_sync(&config, &sync_args).await,
        None => run_sync(&config, &args.sync).await,
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug {
            "garmin_notion_sync=debug,info"
        } else {
            "info"
        })
    });

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_current_span(false)
        .init();
}

async fn run_sync(config: &Config, args: &SyncArgs) -> Result<()> {
    let dates = args.target_dates(config.tz_offset_hours, Utc::now());
    tracing::info!("Sync request: {:?}", dates);

    let mut garmin = GarminClient::new(config.garmin_auth.clone(), config.garmin_api_base.as_deref())?;
    garmin.login().await.context("Garmin login failed")?;

    let notion = NotionClient::new(&config.notion_token);

    let sync_job = DailySync::new(
        garmin,
        notion,
        &config.health_database_id,
        &config.activities_database_id,
        args.options(config.strict),
    );

    sync_job.run(&dates).await.context("Sync failed")?;
    Ok(())
}
