use crate::common::config::GarminAuth;
use crate::common::extract::extract_str;
use crate::common::metrics;
use crate::common::types::{ApiError, ApiResult};
use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde_json::Value;
use tracing::{debug, info};

const SSO_ENDPOINT: &str = "https://sso.garmin.com/sso";
const CONNECT_MODERN: &str = "https://connect.garmin.com/modern/";
/// API root for cookie sessions established through SSO.
const PROXY_ENDPOINT: &str = "https://connect.garmin.com/modern/proxy";
/// API root for bearer tokens.
const CONNECTAPI_ENDPOINT: &str = "https://connectapi.garmin.com";

/// Per-day wellness endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyMetric {
    UserSummary,
    Sleep,
    BodyBattery,
    BodyComposition,
    TrainingReadiness,
    TrainingStatus,
    RestingHeartRate,
    Hrv,
}

impl DailyMetric {
    pub const ALL: [DailyMetric; 8] = [
        DailyMetric::UserSummary,
        DailyMetric::Sleep,
        DailyMetric::BodyBattery,
        DailyMetric::BodyComposition,
        DailyMetric::TrainingReadiness,
        DailyMetric::TrainingStatus,
        DailyMetric::RestingHeartRate,
        DailyMetric::Hrv,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DailyMetric::UserSummary => "user_summary",
            DailyMetric::Sleep => "sleep",
            DailyMetric::BodyBattery => "body_battery",
            DailyMetric::BodyComposition => "body_composition",
            DailyMetric::TrainingReadiness => "training_readiness",
            DailyMetric::TrainingStatus => "training_status",
            DailyMetric::RestingHeartRate => "resting_heart_rate",
            DailyMetric::Hrv => "hrv",
        }
    }

    pub fn path(self, display_name: &str, date: NaiveDate) -> String {
        let user = urlencoding::encode(display_name);
        let day = date.format("%Y-%m-%d");
        match self {
            DailyMetric::UserSummary => {
                format!("/usersummary-service/usersummary/daily/{user}?calendarDate={day}")
            }
            DailyMetric::Sleep => format!(
                "/wellness-service/wellness/dailySleepData/{user}?date={day}&nonSleepBufferMinutes=60"
            ),
            DailyMetric::BodyBattery => format!(
                "/wellness-service/wellness/bodyBattery/reports/daily?startDate={day}&endDate={day}"
            ),
            DailyMetric::BodyComposition => {
                format!("/weight-service/weight/dateRange?startDate={day}&endDate={day}")
            }
            DailyMetric::TrainingReadiness => {
                format!("/metrics-service/metrics/trainingreadiness/{day}")
            }
            DailyMetric::TrainingStatus => {
                format!("/metrics-service/metrics/trainingstatus/aggregated/{day}")
            }
            DailyMetric::RestingHeartRate => format!(
                "/userstats-service/wellness/daily/{user}?fromDate={day}&untilDate={day}&metricId=60"
            ),
            DailyMetric::Hrv => format!("/hrv-service/hrv/{day}"),
        }
    }
}

/// Read-only view of the fitness tracker account. Responses are returned
/// as-is; their shape varies by endpoint version and region.
#[allow(async_fn_in_trait)]
pub trait HealthSource {
    async fn fetch_daily(&self, metric: DailyMetric, date: NaiveDate) -> ApiResult<Value>;

    /// Most recent activities, newest first.
    async fn fetch_activities(&self, start: u32, limit: u32) -> ApiResult<Value>;
}

pub struct GarminClient {
    client: ClientWithMiddleware,
    auth: GarminAuth,
    api_base: String,
    auth_header: Option<String>,
    display_name: Option<String>,
}

impl GarminClient {
    pub fn new(auth: GarminAuth, api_base: Option<&str>) -> ApiResult<Self> {
        // The cookie jar carries the SSO session between requests
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let default_base = match auth {
            GarminAuth::Token(_) => CONNECTAPI_ENDPOINT,
            GarminAuth::Credentials { .. } => PROXY_ENDPOINT,
        };

        Ok(Self {
            client,
            auth,
            api_base: api_base
                .unwrap_or(default_base)
                .trim_end_matches('/')
                .to_string(),
            auth_header: None,
            display_name: None,
        })
    }

    /// Establishes the session and resolves the account's display name,
    /// which several wellness endpoints take as a path segment.
    pub async fn login(&mut self) -> ApiResult<()> {
        match self.auth.clone() {
            GarminAuth::Token(token) => {
                self.auth_header = Some(format!("Bearer {token}"));
            }
            GarminAuth::Credentials { username, password } => {
                self.sso_login(&username, &password).await?;
            }
        }

        let profile = self.get_json("/userprofile-service/socialProfile").await?;
        let display_name = extract_str(&profile, &["displayName", "userName"])
            .ok_or_else(|| ApiError::Auth("profile has no display name".to_string()))?;
        info!("Logged in to Garmin Connect as {}", display_name);
        self.display_name = Some(display_name);
        Ok(())
    }

    async fn sso_login(&self, username: &str, password: &str) -> ApiResult<()> {
        let signin_url = format!("{SSO_ENDPOINT}/signin");
        let params = sso_params();

        let response = self
            .client
            .get(&signin_url)
            .query(&params)
            .send()
            .await
            .inspect_err(|_e| metrics::increment_garmin_api_failure())?;
        let status = response.status();
        if !status.is_success() {
            metrics::increment_garmin_api_failure();
            return Err(status_error(status, "sign-in page"));
        }
        let signin_page = response.text().await?;
        let csrf = extract_between(&signin_page, "name=\"_csrf\" value=\"", "\"")
            .ok_or_else(|| ApiError::Auth("sign-in page has no CSRF token".to_string()))?;

        let form = [
            ("username", username),
            ("password", password),
            ("embed", "false"),
            ("_csrf", csrf.as_str()),
        ];
        let response = self
            .client
            .post(&signin_url)
            .query(&params)
            .header("Origin", "https://sso.garmin.com")
            .form(&form)
            .send()
            .await
            .inspect_err(|_e| metrics::increment_garmin_api_failure())?;
        let body = response.text().await?;

        let ticket = match extract_ticket(&body) {
            Some(ticket) => ticket,
            None if body.contains("MFA") => {
                metrics::increment_garmin_api_failure();
                return Err(ApiError::Auth(
                    "account requires multi-factor authentication, set GARMIN_TOKEN instead"
                        .to_string(),
                ));
            }
            None => {
                metrics::increment_garmin_api_failure();
                return Err(ApiError::Auth("Garmin rejected the credentials".to_string()));
            }
        };

        debug!("Exchanging SSO service ticket");
        let response = self
            .client
            .get(CONNECT_MODERN)
            .query(&[("ticket", ticket.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            metrics::increment_garmin_api_failure();
            return Err(ApiError::Auth(format!(
                "ticket exchange failed with status {}",
                response.status()
            )));
        }

        metrics::increment_garmin_api_success();
        Ok(())
    }

    async fn get_json(&self, path: &str) -> ApiResult<Value> {
        let url = format!("{}{path}", self.api_base);
        debug!("Garmin GET {}", path);

        let mut request = self.client.get(url).header("NK", "NT");
        if let Some(auth_header) = &self.auth_header {
            request = request.header("Authorization", auth_header);
        }

        let response = request.send().await.inspect_err(|_e| {
            metrics::increment_garmin_api_failure();
        })?;

        let status = response.status();
        if !status.is_success() {
            metrics::increment_garmin_api_failure();
            return Err(status_error(status, path));
        }

        let body = response.text().await.inspect_err(|_e| {
            metrics::increment_garmin_api_failure();
        })?;
        metrics::increment_garmin_api_success();

        // Days without data come back as 204 or an empty body
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn display_name(&self) -> ApiResult<&str> {
        self.display_name
            .as_deref()
            .ok_or_else(|| ApiError::Auth("not logged in".to_string()))
    }
}

impl HealthSource for GarminClient {
    async fn fetch_daily(&self, metric: DailyMetric, date: NaiveDate) -> ApiResult<Value> {
        let path = metric.path(self.display_name()?, date);
        self.get_json(&path).await
    }

    async fn fetch_activities(&self, start: u32, limit: u32) -> ApiResult<Value> {
        self.get_json(&format!(
            "/activitylist-service/activities/search/activities?start={start}&limit={limit}"
        ))
        .await
    }
}

fn sso_params() -> [(&'static str, &'static str); 11] {
    [
        ("service", CONNECT_MODERN),
        ("webhost", CONNECT_MODERN),
        ("source", "https://connect.garmin.com/signin/"),
        ("redirectAfterAccountLoginUrl", CONNECT_MODERN),
        ("redirectAfterAccountCreationUrl", CONNECT_MODERN),
        ("gauthHost", SSO_ENDPOINT),
        ("locale", "en_US"),
        ("id", "gauth-widget"),
        ("clientId", "GarminConnect"),
        ("embedWidget", "false"),
        ("generateExtraServiceTicket", "true"),
    ]
}

/// Maps a non-success status to an error. Rejected sessions become `Auth`.
fn status_error(status: StatusCode, what: &str) -> ApiError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ApiError::Auth(format!("Garmin returned {status} for {what}"))
    } else {
        ApiError::Http(status, format!("Garmin returned {status} for {what}"))
    }
}

fn extract_between(haystack: &str, start: &str, end: &str) -> Option<String> {
    let from = haystack.find(start)? + start.len();
    let len = haystack[from..].find(end)?;
    Some(haystack[from..from + len].to_string())
}

/// Service tickets look like `ST-0123456-AbCdEf-cas`.
fn extract_ticket(body: &str) -> Option<String> {
    let from = body.find("ticket=")? + "ticket=".len();
    let ticket: String = body[from..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    (!ticket.is_empty()).then_some(ticket)
}
