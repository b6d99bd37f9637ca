use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use garmin_notion_sync::common::convert::local_date;

use crate::daily_sync::SyncOptions;

/// Copies Garmin Connect health and activity data into Notion databases.
#[derive(Parser, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub sync: SyncArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync health metrics and activities (the default)
    Sync(SyncArgs),
    /// Verify Garmin and Notion access and print the database columns
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Last day to sync (YYYY-MM-DD), defaults to yesterday
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Number of days to sync, ending at --date
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=31))]
    pub days: u32,

    /// Log the rows that would be written without touching Notion
    #[arg(long)]
    pub dry_run: bool,

    /// Stop at the first failed write
    #[arg(long)]
    pub strict: bool,

    /// Write every fetched activity instead of only those on the synced days
    #[arg(long)]
    pub all_activities: bool,

    /// How many recent activities to fetch
    #[arg(long, default_value_t = 10)]
    pub activity_limit: u32,
}

impl SyncArgs {
    pub fn options(&self, strict_from_env: bool) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            strict: self.strict || strict_from_env,
            all_activities: self.all_activities,
            activity_limit: self.activity_limit,
        }
    }

    /// Days to sync, oldest first. Without `--date` the range ends
    /// yesterday, local time.
    pub fn target_dates(&self, tz_offset_hours: i64, now: DateTime<Utc>) -> Vec<NaiveDate> {
        let end = self
            .date
            .unwrap_or_else(|| local_date(now, tz_offset_hours) - Duration::days(1));
        (0..self.days.max(1))
            .rev()
            .map(|back| end - Duration::days(i64::from(back)))
            .collect()
    }
}
