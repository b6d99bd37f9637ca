//! Notion column kinds and the payload shape each one expects.

use serde_json::{Map, Value, json};
use std::collections::HashSet;
use tracing::warn;

/// Column kinds this tool writes to. Other Notion kinds (relations,
/// formulas, people, ...) are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Number,
    Text,
    Select,
    Date,
    Title,
}

/// A value produced by the record builders, before it is shaped for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    /// ISO-8601 date or date-time.
    Date(String),
}

impl FieldValue {
    fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) | FieldValue::Date(s) => s.clone(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Date(_) => None,
        }
    }
}

impl ColumnType {
    pub fn from_notion(kind: &str) -> Option<Self> {
        match kind {
            "number" => Some(ColumnType::Number),
            "rich_text" => Some(ColumnType::Text),
            "select" => Some(ColumnType::Select),
            "date" => Some(ColumnType::Date),
            "title" => Some(ColumnType::Title),
            _ => None,
        }
    }

    pub fn as_notion(self) -> &'static str {
        match self {
            ColumnType::Number => "number",
            ColumnType::Text => "rich_text",
            ColumnType::Select => "select",
            ColumnType::Date => "date",
            ColumnType::Title => "title",
        }
    }

    /// Shapes `value` as this column's property payload. `None` when the
    /// value cannot be represented, e.g. text in a number column.
    pub fn format(self, value: &FieldValue) -> Option<Value> {
        match self {
            ColumnType::Number => format_number(value),
            ColumnType::Text => format_text(value),
            ColumnType::Select => format_select(value),
            ColumnType::Date => format_date(value),
            ColumnType::Title => format_title(value),
        }
    }

    /// Payload that empties a column of this kind. Titles are never cleared.
    pub fn cleared(self) -> Option<Value> {
        match self {
            ColumnType::Number => Some(json!({ "number": null })),
            ColumnType::Text => Some(json!({ "rich_text": [] })),
            ColumnType::Select => Some(json!({ "select": null })),
            ColumnType::Date => Some(json!({ "date": null })),
            ColumnType::Title => None,
        }
    }

    /// Database query filter matching rows whose `column` equals `value`.
    pub fn equals_filter(self, column: &str, value: &FieldValue) -> Option<Value> {
        let condition = match self {
            ColumnType::Number => json!({ "equals": value.as_number()? }),
            ColumnType::Date => match value {
                FieldValue::Date(start) => json!({ "equals": start }),
                _ => return None,
            },
            ColumnType::Text | ColumnType::Select | ColumnType::Title => {
                json!({ "equals": value.as_text() })
            }
        };
        Some(json!({ "property": column, self.as_notion(): condition }))
    }
}

fn format_number(value: &FieldValue) -> Option<Value> {
    Some(json!({ "number": value.as_number()? }))
}

fn format_text(value: &FieldValue) -> Option<Value> {
    Some(json!({ "rich_text": [{ "text": { "content": value.as_text() } }] }))
}

fn format_select(value: &FieldValue) -> Option<Value> {
    // Notion rejects commas in option names
    let name = value.as_text().replace(',', "").trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some(json!({ "select": { "name": name } }))
}

fn format_date(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Date(start) => Some(json!({ "date": { "start": start } })),
        _ => None,
    }
}

fn format_title(value: &FieldValue) -> Option<Value> {
    Some(json!({ "title": [{ "text": { "content": value.as_text() } }] }))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

/// Writable columns of one Notion database, in schema order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSchema {
    pub columns: Vec<Column>,
}

impl DatabaseSchema {
    /// Reads the `properties` object of a Notion database response.
    pub fn from_response(response: &Value) -> Self {
        let mut columns = Vec::new();
        if let Some(properties) = response.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                let kind = property.get("type").and_then(Value::as_str).unwrap_or_default();
                match ColumnType::from_notion(kind) {
                    Some(kind) => columns.push(Column {
                        name: name.clone(),
                        kind,
                    }),
                    None => warn!("Ignoring column '{}' of unsupported type '{}'", name, kind),
                }
            }
        }
        Self { columns }
    }

    pub fn title_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.kind == ColumnType::Title)
    }

    /// Finds a column by name, ignoring case and whitespace. An exact match
    /// wins over the first column whose name contains `desired`.
    pub fn find(&self, desired: &str) -> Option<&Column> {
        self.resolve(desired, &HashSet::new(), &HashSet::new())
    }

    /// The column whose normalized name equals `desired`'s.
    pub fn exact(&self, desired: &str) -> Option<&Column> {
        let wanted = normalize_name(desired);
        if wanted.is_empty() {
            return None;
        }
        self.columns.iter().find(|c| normalize_name(&c.name) == wanted)
    }

    /// Like [`find`](Self::find), but never returns a column in `taken`, and
    /// only falls back to a substring match that is not in `reserved`.
    pub fn resolve(
        &self,
        desired: &str,
        taken: &HashSet<&str>,
        reserved: &HashSet<&str>,
    ) -> Option<&Column> {
        let wanted = normalize_name(desired);
        if wanted.is_empty() {
            return None;
        }
        let free = |c: &&Column| !taken.contains(c.name.as_str());
        self.columns
            .iter()
            .filter(free)
            .find(|c| normalize_name(&c.name) == wanted)
            .or_else(|| {
                self.columns
                    .iter()
                    .filter(free)
                    .filter(|c| !reserved.contains(c.name.as_str()))
                    .find(|c| normalize_name(&c.name).contains(&wanted))
            })
    }
}

pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<String>().to_lowercase()
}

/// Property payload for one page, keyed by the real column name.
pub type Properties = Map<String, Value>;
