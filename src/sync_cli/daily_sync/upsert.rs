use super::{DailySync, Row, SyncSummary, Table};
use anyhow::{Result, anyhow};
use garmin_notion_sync::common::notion_client::DocumentStore;
use garmin_notion_sync::common::notion_property::{
    ColumnType, DatabaseSchema, FieldValue, Properties,
};
use garmin_notion_sync::common::types::ApiResult;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    Created,
    Updated,
}

impl<G, D: DocumentStore> DailySync<G, D> {
    /// Writes one row, updating the page that already carries the row's
    /// dedup key if there is one.
    pub(super) async fn upsert(&self, table: &Table, row: Row, summary: &mut SyncSummary) -> Result<()> {
        if let Err(reason) = row.validate() {
            warn!("Skipping {} row '{}': {}", table.label, row.title, reason);
            summary.skipped += 1;
            return Ok(());
        }

        let properties = build_properties(&table.schema, &row);

        if self.options.dry_run {
            info!(
                "Dry run, would write {} row '{}': {}",
                table.label,
                row.title,
                serde_json::Value::Object(properties)
            );
            summary.skipped += 1;
            return Ok(());
        }

        match self.write(table, &row, properties).await {
            Ok(WriteOutcome::Created) => {
                info!("Created {} row '{}'", table.label, row.title);
                summary.created += 1;
            }
            Ok(WriteOutcome::Updated) => {
                info!("Updated {} row '{}'", table.label, row.title);
                summary.updated += 1;
            }
            Err(e) if self.options.strict => {
                summary.failed += 1;
                return Err(anyhow!("Failed to write {} row '{}': {}", table.label, row.title, e));
            }
            Err(e) => {
                error!("Failed to write {} row '{}': {}", table.label, row.title, e);
                summary.failed += 1;
            }
        }
        Ok(())
    }

    async fn write(&self, table: &Table, row: &Row, properties: Properties) -> ApiResult<WriteOutcome> {
        let existing = match dedup_filter(&table.schema, row) {
            Some(filter) => self
                .notion
                .query_database(&table.id, filter)
                .await?
                .into_iter()
                .next(),
            None => {
                debug!("No dedup column for {} row '{}', creating", table.label, row.title);
                None
            }
        };

        match existing {
            Some(page_id) => {
                self.notion.update_page(&page_id, properties).await?;
                Ok(WriteOutcome::Updated)
            }
            None => {
                self.notion.create_page(&table.id, properties).await?;
                Ok(WriteOutcome::Created)
            }
        }
    }
}

fn dedup_filter(schema: &DatabaseSchema, row: &Row) -> Option<Value> {
    let key = row.dedup.as_ref()?;
    let column = schema.find(key.column)?;
    column.kind.equals_filter(&column.name, &key.value)
}

/// Maps a row onto the database's real columns. The title column takes the
/// row title, the date column the row date. Every other field goes to its
/// exact column, or else to the first free column containing its name that
/// no other field of the row names exactly. A column is written at most once.
pub(super) fn build_properties(schema: &DatabaseSchema, row: &Row) -> Properties {
    let mut properties = Properties::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    if let Some(title) = schema.title_column() {
        claimed.insert(title.name.as_str());
        if let Some(value) = title.kind.format(&FieldValue::Text(row.title.clone())) {
            properties.insert(title.name.clone(), value);
        }
    }

    if let (Some(date), Some(column)) = (&row.date, schema.find("Date")) {
        if column.kind != ColumnType::Title {
            if let Some(value) = column.kind.format(&FieldValue::Date(date.clone())) {
                properties.insert(column.name.clone(), value);
                claimed.insert(column.name.as_str());
            }
        }
    }

    let reserved: HashSet<&str> = row
        .fields
        .iter()
        .filter_map(|(name, _)| schema.exact(name))
        .map(|column| column.name.as_str())
        .collect();

    for (name, value) in &row.fields {
        let Some(column) = schema.resolve(name, &claimed, &reserved) else {
            debug!("No column for '{}'", name);
            continue;
        };
        let formatted = match value {
            Some(value) => column.kind.format(value),
            None => column.kind.cleared(),
        };
        match formatted {
            Some(formatted) => {
                properties.insert(column.name.clone(), formatted);
                claimed.insert(column.name.as_str());
            }
            None => debug!(
                "Value for '{}' does not fit {} column '{}'",
                name,
                column.kind.as_notion(),
                column.name
            ),
        }
    }

    properties
}
