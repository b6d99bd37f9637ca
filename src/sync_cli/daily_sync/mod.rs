use garmin_notion_sync::common::metrics;
use garmin_notion_sync::common::notion_property::DatabaseSchema;

mod records;
mod sync;
mod upsert;

pub use records::{ActivityRecord, DailyResponses, HealthRecord, Row};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Build and log payloads without writing to Notion.
    pub dry_run: bool,
    /// Abort the run on the first failed write instead of skipping it.
    pub strict: bool,
    /// Write every fetched activity, not only those on the synced days.
    pub all_activities: bool,
    pub activity_limit: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            strict: false,
            all_activities: false,
            activity_limit: 10,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncSummary {
    fn record_metrics(&self) {
        metrics::increment_records_created(self.created as u64);
        metrics::increment_records_updated(self.updated as u64);
        metrics::increment_records_skipped(self.skipped as u64);
        metrics::increment_records_failed(self.failed as u64);
    }
}

/// A destination table with its schema, loaded once per run.
pub struct Table {
    pub id: String,
    pub label: &'static str,
    pub schema: DatabaseSchema,
}

/// Pulls one or more days from Garmin and upserts them into the health and
/// activities databases.
pub struct DailySync<G, D> {
    garmin: G,
    notion: D,
    health_database_id: String,
    activities_database_id: String,
    options: SyncOptions,
}

impl<G, D> DailySync<G, D> {
    pub fn new(
        garmin: G,
        notion: D,
        health_database_id: &str,
        activities_database_id: &str,
        options: SyncOptions,
    ) -> Self {
        Self {
            garmin,
            notion,
            health_database_id: health_database_id.to_string(),
            activities_database_id: activities_database_id.to_string(),
            options,
        }
    }
}
