use super::{ActivityRecord, DailyResponses, DailySync, HealthRecord, SyncSummary, Table};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use function_timer::time;
use garmin_notion_sync::common::garmin_client::{DailyMetric, HealthSource};
use garmin_notion_sync::common::metrics::increment_metric_fetch_fallback;
use garmin_notion_sync::common::notion_client::DocumentStore;
use serde_json::Value;
use tracing::{info, warn};

impl<G: HealthSource, D: DocumentStore> DailySync<G, D> {
    /// Syncs the health row of every day in `dates`, then the activities
    /// that started on those days.
    #[time("sync_run_duration")]
    pub async fn run(&self, dates: &[NaiveDate]) -> Result<SyncSummary> {
        let health_table = self
            .load_table(&self.health_database_id, "health")
            .await?;
        let activities_table = self
            .load_table(&self.activities_database_id, "activities")
            .await?;

        let mut summary = SyncSummary::default();
        let result = self
            .sync_dates(dates, &health_table, &activities_table, &mut summary)
            .await;

        summary.record_metrics();
        let counts = format!(
            "{} created, {} updated, {} skipped, {} failed",
            summary.created, summary.updated, summary.skipped, summary.failed
        );
        match result {
            Ok(()) => {
                info!("Sync finished: {}", counts);
                Ok(summary)
            }
            Err(e) => {
                warn!("Sync stopped: {}", counts);
                Err(e.context(format!("Sync stopped after {counts}")))
            }
        }
    }

    async fn sync_dates(
        &self,
        dates: &[NaiveDate],
        health_table: &Table,
        activities_table: &Table,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        for date in dates {
            self.sync_health(*date, health_table, summary).await?;
        }
        self.sync_activities(dates, activities_table, summary).await
    }

    async fn load_table(&self, database_id: &str, label: &'static str) -> Result<Table> {
        let schema = self
            .notion
            .retrieve_database(database_id)
            .await
            .with_context(|| format!("Failed to load {label} database schema"))?;

        if schema.title_column().is_none() {
            warn!("The {} database has no title column", label);
        }
        info!("Loaded {} database with {} columns", label, schema.columns.len());

        Ok(Table {
            id: database_id.to_string(),
            label,
            schema,
        })
    }

    /// Fetches every per-day metric. A metric that fails to load is logged
    /// and left empty so the rest of the day still syncs.
    pub(super) async fn fetch_daily_responses(&self, date: NaiveDate) -> DailyResponses {
        let mut responses = DailyResponses::default();
        for metric in DailyMetric::ALL {
            let value = match self.garmin.fetch_daily(metric, date).await {
                Ok(value) => value,
                Err(e) => {
                    warn!("Failed to fetch {} for {}: {}", metric.name(), date, e);
                    increment_metric_fetch_fallback(metric.name());
                    Value::Null
                }
            };
            responses.set(metric, value);
        }
        responses
    }

    #[time("sync_health_duration")]
    async fn sync_health(
        &self,
        date: NaiveDate,
        table: &Table,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        info!("Syncing health metrics for {}", date);
        let responses = self.fetch_daily_responses(date).await;
        let record = HealthRecord::from_responses(date, &responses);
        if !record.has_metrics() {
            warn!("No health metrics found for {}", date);
        }
        self.upsert(table, record.to_row(), summary).await
    }

    #[time("sync_activities_duration")]
    async fn sync_activities(
        &self,
        dates: &[NaiveDate],
        table: &Table,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        let response = match self
            .garmin
            .fetch_activities(0, self.options.activity_limit)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch activities: {}", e);
                return Ok(());
            }
        };

        let activities: Vec<ActivityRecord> = match &response {
            Value::Array(items) => items.iter().map(ActivityRecord::from_response).collect(),
            _ => Vec::new(),
        };
        info!("Fetched {} recent activities", activities.len());

        let selected: Vec<&ActivityRecord> = activities
            .iter()
            .filter(|activity| {
                self.options.all_activities
                    || activity
                        .local_date()
                        .is_some_and(|day| dates.contains(&day))
            })
            .collect();
        info!("Syncing {} activities", selected.len());

        for activity in selected {
            self.upsert(table, activity.to_row(), summary).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::{FakeGarmin, FakeNotion};
    use super::super::{DailySync, SyncOptions, SyncSummary};
    use chrono::NaiveDate;
    use garmin_notion_sync::common::notion_property::DatabaseSchema;
    use serde_json::{Value, json};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn notion() -> FakeNotion {
        let mut notion = FakeNotion::default();
        notion.schemas.insert(
            "health".to_string(),
            DatabaseSchema::from_response(&json!({"properties": {
                "Name": {"type": "title"},
                "Date": {"type": "date"},
                "Steps": {"type": "number"},
                "Sleep Score": {"type": "number"},
                "Training Status": {"type": "select"}
            }})),
        );
        notion.schemas.insert(
            "activities".to_string(),
            DatabaseSchema::from_response(&json!({"properties": {
                "Activity": {"type": "title"},
                "Date": {"type": "date"},
                "Activity ID": {"type": "rich_text"},
                "Type": {"type": "select"},
                "Distance (mi)": {"type": "number"}
            }})),
        );
        notion
    }

    fn garmin() -> FakeGarmin {
        let mut garmin = FakeGarmin::default();
        garmin.daily.insert("user_summary", json!({"totalSteps": 10234}));
        garmin
            .daily
            .insert("sleep", json!({"dailySleepDTO": {"sleepScores": {"overall": {"value": 80}}}}));
        garmin.activities = json!([
            {"activityId": 2, "activityName": "Evening Ride", "startTimeLocal": "2024-03-02 18:00:00",
             "activityType": {"typeKey": "road_biking"}, "distance": 20000.0},
            {"activityId": 1, "activityName": "Morning Run", "startTimeLocal": "2024-03-02 06:45:10",
             "activityType": {"typeKey": "running"}, "distance": 5000.0},
            {"activityId": 0, "activityName": "Old Swim", "startTimeLocal": "2024-02-28 07:00:00",
             "activityType": {"typeKey": "lap_swimming"}, "distance": 1500.0}
        ]);
        garmin
    }

    fn job(garmin: FakeGarmin, notion: FakeNotion, options: SyncOptions) -> DailySync<FakeGarmin, FakeNotion> {
        DailySync::new(garmin, notion, "health", "activities", options)
    }

    #[tokio::test]
    async fn test_run_creates_health_and_same_day_activities() {
        let job = job(garmin(), notion(), SyncOptions::default());
        let summary = job.run(&[day(2)]).await.unwrap();

        assert_eq!(
            summary,
            SyncSummary {
                created: 3,
                updated: 0,
                skipped: 0,
                failed: 0
            }
        );

        let health = job.notion.pages_in("health");
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].properties["Steps"], json!({"number": 10234.0}));
        assert_eq!(health[0].properties["Sleep Score"], json!({"number": 80.0}));
        assert_eq!(
            health[0].properties["Name"],
            json!({"title": [{"text": {"content": "Health 2024-03-02"}}]})
        );

        let activities = job.notion.pages_in("activities");
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].properties["Type"], json!({"select": {"name": "Road Biking"}}));
        assert_eq!(activities[1].properties["Distance (mi)"], json!({"number": 3.11}));
    }

    #[tokio::test]
    async fn test_second_run_updates_instead_of_duplicating() {
        let job = job(garmin(), notion(), SyncOptions::default());
        job.run(&[day(2)]).await.unwrap();
        let summary = job.run(&[day(2)]).await.unwrap();

        assert_eq!(summary.created, 0);
        assert_eq!(summary.updated, 3);
        assert_eq!(job.notion.pages_in("health").len(), 1);
        assert_eq!(job.notion.pages_in("activities").len(), 2);
    }

    #[tokio::test]
    async fn test_failed_metric_does_not_stop_the_day() {
        let mut garmin = garmin();
        garmin.failing.insert("sleep");
        garmin.failing.insert("hrv");
        let job = job(garmin, notion(), SyncOptions::default());

        let summary = job.run(&[day(2)]).await.unwrap();
        assert_eq!(summary.created, 3);

        let health = job.notion.pages_in("health");
        assert_eq!(health[0].properties["Steps"], json!({"number": 10234.0}));
        assert_eq!(health[0].properties["Sleep Score"], json!({"number": null}));
    }

    #[tokio::test]
    async fn test_update_clears_metric_missing_on_resync() {
        let job = job(garmin(), notion(), SyncOptions::default());
        job.run(&[day(2)]).await.unwrap();
        assert_eq!(
            job.notion.pages_in("health")[0].properties["Sleep Score"],
            json!({"number": 80.0})
        );

        let mut garmin = garmin();
        garmin.daily.remove("sleep");
        let resync = DailySync {
            garmin,
            ..job
        };
        let summary = resync.run(&[day(2)]).await.unwrap();

        assert_eq!(summary.updated, 3);
        let health = resync.notion.pages_in("health");
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].properties["Sleep Score"], json!({"number": null}));
        assert_eq!(health[0].properties["Steps"], json!({"number": 10234.0}));
    }

    #[tokio::test]
    async fn test_strict_abort_reports_counts_so_far() {
        let mut notion = notion();
        notion.fail_writes = true;
        let options = SyncOptions {
            strict: true,
            ..SyncOptions::default()
        };
        let job = job(garmin(), notion, options);

        let err = job.run(&[day(1), day(2)]).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Sync stopped after 0 created, 0 updated, 0 skipped, 1 failed"));
        assert!(message.contains("validation_error"));
        assert_eq!(*job.notion.writes.borrow(), 1);
    }

    #[tokio::test]
    async fn test_activity_list_failure_keeps_health_row() {
        let mut garmin = garmin();
        garmin.activities_fail = true;
        let job = job(garmin, notion(), SyncOptions::default());

        let summary = job.run(&[day(2)]).await.unwrap();
        assert_eq!(summary.created, 1);
        assert!(job.notion.pages_in("activities").is_empty());
    }

    #[tokio::test]
    async fn test_all_activities_and_limit() {
        let options = SyncOptions {
            all_activities: true,
            activity_limit: 3,
            ..SyncOptions::default()
        };
        let job = job(garmin(), notion(), options);
        job.run(&[day(2)]).await.unwrap();
        assert_eq!(job.notion.pages_in("activities").len(), 3);

        let options = SyncOptions {
            all_activities: true,
            activity_limit: 1,
            ..SyncOptions::default()
        };
        let job = super::super::DailySync::new(garmin(), notion(), "health", "activities", options);
        job.run(&[day(2)]).await.unwrap();
        assert_eq!(job.notion.pages_in("activities").len(), 1);
    }

    #[tokio::test]
    async fn test_multiple_days() {
        let job = job(garmin(), notion(), SyncOptions::default());
        let summary = job.run(&[day(1), day(2)]).await.unwrap();

        assert_eq!(summary.created, 4);
        let dates: Vec<Value> = job
            .notion
            .pages_in("health")
            .iter()
            .map(|p| p.properties["Date"].clone())
            .collect();
        assert_eq!(
            dates,
            [
                json!({"date": {"start": "2024-03-01"}}),
                json!({"date": {"start": "2024-03-02"}})
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_database_is_fatal() {
        let mut notion = notion();
        notion.schemas.remove("activities");
        let job = job(garmin(), notion, SyncOptions::default());

        let err = job.run(&[day(2)]).await.unwrap_err();
        assert!(err.to_string().contains("activities database schema"));
        assert_eq!(*job.notion.writes.borrow(), 0);
    }
}
