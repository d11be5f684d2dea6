//! Maps handler failures onto the closed error taxonomy.
//!
//! Classification looks at an explicit status first, then at the failure's
//! type name. It never reads the failure's message. The original failure is
//! logged for operators; the returned [`SanitizedError`] carries only the
//! code, a fixed phrase, and caller-supplied resource hints.

use crate::catalog::ToolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownOperation,
    InvalidInput,
    AuthFailed,
    AuthzDenied,
    NotFound,
    RateLimited,
    OperationTimeout,
    ServiceUnavailable,
    OperationFailed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnknownOperation => "UNKNOWN_OPERATION",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::AuthzDenied => "AUTHZ_DENIED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::OperationTimeout => "OPERATION_TIMEOUT",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::OperationFailed => "OPERATION_FAILED",
        }
    }

    /// Gateway-owned wording shown to callers in place of any vendor text.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::UnknownOperation => "The requested operation does not exist.",
            ErrorCode::InvalidInput => "The operation arguments are invalid.",
            ErrorCode::AuthFailed => "Authentication failed.",
            ErrorCode::AuthzDenied => "Permission denied.",
            ErrorCode::NotFound => "The requested resource was not found.",
            ErrorCode::RateLimited => "Rate limit exceeded. Try again later.",
            ErrorCode::OperationTimeout => "The operation timed out.",
            ErrorCode::ServiceUnavailable => "The remote service is unavailable.",
            ErrorCode::OperationFailed => "The operation failed.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error object safe to hand to any caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a SanitizedError,
}

impl SanitizedError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            http_status: None,
            resource_type: None,
            resource_id: None,
        }
    }

    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    pub fn with_resource(mut self, resource_type: Option<&str>, resource_id: Option<&str>) -> Self {
        self.resource_type = resource_type.map(str::to_string);
        self.resource_id = resource_id.map(str::to_string);
        self
    }

    /// `{"error": {...}}`, the text placed in the error content block.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&ErrorBody { error: self })
            .unwrap_or_else(|_| format!("{{\"error\":{{\"code\":\"{}\"}}}}", self.code))
    }
}

pub fn sanitize(
    error: &ToolError,
    resource_type: Option<&str>,
    resource_id: Option<&str>,
) -> SanitizedError {
    let code = match error.http_status() {
        Some(status) => classify_status(status),
        None => classify_type_name(error.type_name()).unwrap_or(ErrorCode::OperationFailed),
    };

    warn!(
        code = %code,
        error_type = error.type_name(),
        status = ?error.http_status(),
        resource_type = ?resource_type,
        resource_id = ?resource_id,
        error = %error,
        "Operation failed"
    );

    SanitizedError::new(code)
        .with_http_status(error.http_status())
        .with_resource(resource_type, resource_id)
}

pub fn classify_status(status: u16) -> ErrorCode {
    match status {
        401 => ErrorCode::AuthFailed,
        403 => ErrorCode::AuthzDenied,
        404 => ErrorCode::NotFound,
        400 | 422 => ErrorCode::InvalidInput,
        429 => ErrorCode::RateLimited,
        s if s >= 500 => ErrorCode::ServiceUnavailable,
        _ => ErrorCode::OperationFailed,
    }
}

/// Substring keywords and whole-word keywords per bucket, checked in order.
const KEYWORD_BUCKETS: &[(&[&str], &[&str], ErrorCode)] = &[
    (&["auth", "token", "credential"], &[], ErrorCode::AuthFailed),
    (&["permission", "forbidden"], &[], ErrorCode::AuthzDenied),
    (&["notfound", "not_found"], &[], ErrorCode::NotFound),
    (&["validation", "invalid"], &[], ErrorCode::InvalidInput),
    (
        &["ratelimit", "rate_limit", "toomanyrequests", "throttl"],
        &["rate"],
        ErrorCode::RateLimited,
    ),
    (&["timeout", "timedout", "timed_out"], &[], ErrorCode::OperationTimeout),
    (
        &["connect", "unavailable", "refused"],
        &[],
        ErrorCode::ServiceUnavailable,
    ),
];

/// Buckets a Rust type name by keyword. Only the final path segment is
/// considered, with generic arguments stripped.
pub fn classify_type_name(type_name: &str) -> Option<ErrorCode> {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let segment = base.rsplit("::").next().unwrap_or(base);
    let lowered = segment.to_ascii_lowercase();
    let words = identifier_words(segment);

    KEYWORD_BUCKETS
        .iter()
        .find(|(keywords, word_keywords, _)| {
            keywords.iter().any(|keyword| lowered.contains(keyword))
                || word_keywords
                    .iter()
                    .any(|keyword| words.iter().any(|word| word == keyword))
        })
        .map(|(_, _, code)| *code)
}

/// Splits an identifier into lowercase words at `_`, lower-to-upper
/// transitions, and the end of an acronym (`HTTPRate` is `http`, `rate`).
fn identifier_words(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (index, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() && index > 0 {
            let prev = chars[index - 1];
            let next_is_lower = chars.get(index + 1).is_some_and(|next| next.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
