use metrics::counter;

/// Error/Reliability Metrics - Success/Failure pairs
pub fn increment_garmin_api_success() {
    counter!("garmin_api_total", "result" => "success").increment(1);
}

pub fn increment_garmin_api_failure() {
    counter!("garmin_api_total", "result" => "failure").increment(1);
}

pub fn increment_notion_api_success() {
    counter!("notion_api_total", "result" => "success").increment(1);
}

pub fn increment_notion_api_failure() {
    counter!("notion_api_total", "result" => "failure").increment(1);
}

/// Business Logic Metrics
pub fn increment_records_created(count: u64) {
    counter!("records_total", "outcome" => "created").increment(count);
}

pub fn increment_records_updated(count: u64) {
    counter!("records_total", "outcome" => "updated").increment(count);
}

pub fn increment_records_skipped(count: u64) {
    counter!("records_total", "outcome" => "skipped").increment(count);
}

pub fn increment_records_failed(count: u64) {
    counter!("records_total", "outcome" => "failed").increment(count);
}

pub fn increment_metric_fetch_fallback(metric: &'static str) {
    counter!("metric_fetch_fallback_total", "metric" => metric).increment(1);
}
