use crate::core::error::AuthError;
use serde::Serialize;

/// `{ success, error?, message?, data? }` envelope rendered by callers
#[derive(Debug, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error: None,
            message: None,
            data: Some(data),
        }
    }

    pub fn failed(error: &AuthError) -> Self {
        Self {
            success: false,
            error: Some(error.code()),
            message: Some(error.to_string()),
            data: None,
        }
    }
}

impl<T> From<Result<T, AuthError>> for Outcome<T> {
    fn from(result: Result<T, AuthError>) -> Self {
        match result {
            Ok(data) => Outcome::ok(data),
            Err(e) => Outcome::failed(&e),
        }
    }
}
