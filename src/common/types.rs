use std::fmt;

use reqwest::StatusCode;

#[derive(Debug)]
pub enum ApiError {
    Http(StatusCode, String),
    Network(reqwest_middleware::Error),
    Decode(String),
    Auth(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Http(status, _) if *status == StatusCode::NOT_FOUND)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(status, body) if body.is_empty() => write!(f, "HTTP {status}"),
            ApiError::Http(status, body) => write!(f, "HTTP {status}: {body}"),
            ApiError::Network(e) => write!(f, "Network error: {e}"),
            ApiError::Decode(msg) => write!(f, "Decode error: {msg}"),
            ApiError::Auth(msg) => write!(f, "Authentication error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest_middleware::Error> for ApiError {
    fn from(err: reqwest_middleware::Error) -> Self {
        ApiError::Network(err)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(reqwest_middleware::Error::Reqwest(err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
