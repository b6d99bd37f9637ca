use anyhow::{Context, Result, bail};
use chrono::Utc;
use garmin_notion_sync::common::config::Config;
use garmin_notion_sync::common::convert::local_date;
use garmin_notion_sync::common::extract::extract_i64;
use garmin_notion_sync::common::garmin_client::{DailyMetric, GarminClient, HealthSource};
use garmin_notion_sync::common::notion_client::{DocumentStore, NotionClient};
use tracing::error;

/// Connection test for both services. Prints what it finds and fails if
/// either side is unreachable.
pub async fn run_check(config: &Config) -> Result<()> {
    let notion = NotionClient::new(&config.notion_token);
    let mut failures = 0;

    for (label, database_id) in [
        ("Health", &config.health_database_id),
        ("Activities", &config.activities_database_id),
    ] {
        match notion.retrieve_database(database_id).await {
            Ok(schema) => {
                println!("Notion {label} database: {} columns", schema.columns.len());
                for column in &schema.columns {
                    println!("  {} ({})", column.name, column.kind.as_notion());
                }
            }
            Err(e) => {
                error!("Failed to read {} database: {}", label, e);
                eprintln!("Notion {label} database: {e}");
                failures += 1;
            }
        }
    }

    match check_garmin(config).await {
        Ok(steps) => match steps {
            Some(steps) => println!("Garmin login ok, {steps} steps today"),
            None => println!("Garmin login ok, no step data yet today"),
        },
        Err(e) => {
            error!("Garmin check failed: {:#}", e);
            eprintln!("Garmin: {e:#}");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} connection check(s) failed");
    }
    Ok(())
}

async fn check_garmin(config: &Config) -> Result<Option<i64>> {
    let mut garmin = GarminClient::new(config.garmin_auth.clone(), config.garmin_api_base.as_deref())?;
    garmin.login().await.context("Garmin login failed")?;

    let today = local_date(Utc::now(), config.tz_offset_hours);
    let summary = garmin
        .fetch_daily(DailyMetric::UserSummary, today)
        .await
        .context("Failed to fetch today's summary")?;
    Ok(extract_i64(&summary, &["totalSteps", "steps"]))
}
