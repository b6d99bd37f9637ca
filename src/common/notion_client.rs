use crate::common::metrics;
use crate::common::notion_property::{DatabaseSchema, Properties};
use crate::common::types::{ApiError, ApiResult};
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde_json::{Value, json};
use tracing::debug;

const ENDPOINT: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// The table operations the sync needs from the destination store.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    async fn retrieve_database(&self, database_id: &str) -> ApiResult<DatabaseSchema>;

    /// Ids of pages in `database_id` matching `filter`.
    async fn query_database(&self, database_id: &str, filter: Value) -> ApiResult<Vec<String>>;

    /// Creates a page and returns its id.
    async fn create_page(&self, database_id: &str, properties: Properties) -> ApiResult<String>;

    async fn update_page(&self, page_id: &str, properties: Properties) -> ApiResult<()>;
}

pub struct NotionClient {
    client: ClientWithMiddleware,
    auth_header: String,
    endpoint: String,
}

impl NotionClient {
    pub fn new(token: &str) -> Self {
        Self::with_endpoint(token, ENDPOINT)
    }

    pub fn with_endpoint(token: &str, endpoint: &str) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            auth_header: format!("Bearer {token}"),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> ApiResult<Value> {
        let url = format!("{}{path}", self.endpoint);
        debug!("Notion {} {}", method, path);

        let mut request = self
            .client
            .request(method, url)
            .header("Authorization", &self.auth_header)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.inspect_err(|_e| {
            metrics::increment_notion_api_failure();
        })?;

        let status = response.status();
        let text = response.text().await.inspect_err(|_e| {
            metrics::increment_notion_api_failure();
        })?;

        if !status.is_success() {
            metrics::increment_notion_api_failure();
            return Err(ApiError::Http(status, error_message(&text)));
        }

        let value = serde_json::from_str(&text).inspect_err(|_e| {
            metrics::increment_notion_api_failure();
        })?;

        metrics::increment_notion_api_success();
        Ok(value)
    }
}

/// Notion error bodies carry a human readable `message`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn page_id(response: &Value) -> ApiResult<String> {
    response
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Decode("page response has no id".to_string()))
}

impl DocumentStore for NotionClient {
    async fn retrieve_database(&self, database_id: &str) -> ApiResult<DatabaseSchema> {
        let response = self
            .send(Method::GET, &format!("/databases/{database_id}"), None)
            .await?;
        Ok(DatabaseSchema::from_response(&response))
    }

    async fn query_database(&self, database_id: &str, filter: Value) -> ApiResult<Vec<String>> {
        let response = self
            .send(
                Method::POST,
                &format!("/databases/{database_id}/query"),
                Some(json!({ "filter": filter, "page_size": 10 })),
            )
            .await?;

        let ids: Vec<String> = response
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().filter_map(|page| page_id(page).ok()).collect())
            .unwrap_or_default();
        Ok(ids)
    }

    async fn create_page(&self, database_id: &str, properties: Properties) -> ApiResult<String> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        let response = self.send(Method::POST, "/pages", Some(body)).await?;
        page_id(&response)
    }

    async fn update_page(&self, page_id: &str, properties: Properties) -> ApiResult<()> {
        let body = json!({ "properties": properties });
        self.send(Method::PATCH, &format!("/pages/{page_id}"), Some(body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_notion_message() {
        let body = r#"{"object":"error","status":400,"code":"validation_error","message":"Date is not a property that exists."}"#;
        assert_eq!(error_message(body), "Date is not a property that exists.");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_page_id() {
        assert_eq!(page_id(&json!({"object": "page", "id": "abc-123"})).unwrap(), "abc-123");
        assert!(matches!(page_id(&json!({})), Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = NotionClient::with_endpoint("secret", "http://localhost:9000/v1/");
        assert_eq!(client.endpoint, "http://localhost:9000/v1");
        assert_eq!(client.auth_header, "Bearer secret");
    }
}
