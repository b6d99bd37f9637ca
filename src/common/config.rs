use std::env;
use std::fmt;

/// How the Garmin session is established.
#[derive(Clone, PartialEq, Eq)]
pub enum GarminAuth {
    /// Pre-issued OAuth bearer token, e.g. one cached by a CI job.
    Token(String),
    Credentials { username: String, password: String },
}

impl fmt::Debug for GarminAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GarminAuth::Token(_) => f.write_str("Token(<redacted>)"),
            GarminAuth::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub garmin_auth: GarminAuth,
    pub garmin_api_base: Option<String>,
    pub notion_token: String,
    pub health_database_id: String,
    pub activities_database_id: String,
    pub debug: bool,
    pub strict: bool,
    /// Offset from UTC used to decide which calendar day is "yesterday".
    pub tz_offset_hours: i64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{name} environment variable not set"),
            ConfigError::Invalid { name, value } => {
                write!(f, "{name} has an invalid value: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let notion_token = require("NOTION_TOKEN")?;
        let health_database_id = require("NOTION_HEALTH_DB_ID")?;
        let activities_database_id = require("NOTION_ACTIVITIES_DB_ID")?;

        let garmin_auth = match get("GARMIN_TOKEN") {
            Some(token) => GarminAuth::Token(token),
            None => {
                let username = get("GARMIN_USERNAME")
                    .or_else(|| get("GARMIN_EMAIL"))
                    .ok_or(ConfigError::Missing("GARMIN_USERNAME"))?;
                let password = require("GARMIN_PASSWORD")?;
                GarminAuth::Credentials { username, password }
            }
        };

        let tz_offset_hours = match get("TZ_OFFSET_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| (-14..=14).contains(hours))
                .ok_or(ConfigError::Invalid {
                    name: "TZ_OFFSET_HOURS",
                    value: raw,
                })?,
            None => 0,
        };

        Ok(Self {
            garmin_auth,
            garmin_api_base: get("GARMIN_API_BASE"),
            notion_token,
            health_database_id,
            activities_database_id,
            debug: get("DEBUG").is_some_and(|v| is_truthy(&v)),
            strict: get("SYNC_STRICT").is_some_and(|v| is_truthy(&v)),
            tz_offset_hours,
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const NOTION: &[(&str, &str)] = &[
        ("NOTION_TOKEN", "secret_abc"),
        ("NOTION_HEALTH_DB_ID", "health-db"),
        ("NOTION_ACTIVITIES_DB_ID", "activities-db"),
    ];

    #[test]
    fn test_credentials_with_email_alias() {
        let mut vars = NOTION.to_vec();
        vars.extend([("GARMIN_EMAIL", "me@example.com"), ("GARMIN_PASSWORD", "pw")]);

        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.garmin_auth,
            GarminAuth::Credentials {
                username: "me@example.com".to_string(),
                password: "pw".to_string()
            }
        );
        assert!(!config.debug);
        assert_eq!(config.tz_offset_hours, 0);
    }

    #[test]
    fn test_token_takes_precedence() {
        let mut vars = NOTION.to_vec();
        vars.extend([
            ("GARMIN_TOKEN", "tok"),
            ("GARMIN_USERNAME", "me"),
            ("DEBUG", "Yes"),
            ("TZ_OFFSET_HOURS", "-5"),
        ]);

        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.garmin_auth, GarminAuth::Token("tok".to_string()));
        assert!(config.debug);
        assert_eq!(config.tz_offset_hours, -5);
    }

    #[test]
    fn test_missing_values_are_reported() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("NOTION_TOKEN"));

        let mut vars = NOTION.to_vec();
        vars.push(("GARMIN_USERNAME", "me"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GARMIN_PASSWORD"));

        let mut vars = NOTION.to_vec();
        vars.push(("GARMIN_PASSWORD", "  "));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GARMIN_USERNAME"));
    }

    #[test]
    fn test_invalid_offset() {
        let mut vars = NOTION.to_vec();
        vars.extend([("GARMIN_TOKEN", "tok"), ("TZ_OFFSET_HOURS", "eleven")]);
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "TZ_OFFSET_HOURS", .. }));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let auth = GarminAuth::Credentials {
            username: "me".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
