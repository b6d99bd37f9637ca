pub mod config;
pub mod convert;
pub mod extract;
pub mod garmin_client;
pub mod metrics;
pub mod notion_client;
pub mod notion_property;
pub mod types;
