//! Failure type returned by operation handlers.
//!
//! A [`ToolError`] keeps everything operators need (the originating Rust
//! type, any HTTP status the vendor returned, the full source chain) so the
//! sanitizer can classify it and log it. None of it is ever sent to a caller.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub struct ToolError {
    type_name: Cow<'static, str>,
    status: Option<u16>,
    resource_type: Option<String>,
    resource_id: Option<String>,
    source: BoxError,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

impl ToolError {
    /// Wraps a concrete error, recording its Rust type name for classification.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from_parts(Cow::Borrowed(std::any::type_name::<E>()), Box::new(error))
    }

    /// A failure with no concrete error type. `kind` plays the role of the
    /// type name, e.g. `"RateLimitError"` or `"TokenExpired"`.
    pub fn kind(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::from_parts(kind.into(), Box::new(Message(message.into())))
    }

    /// A failure carrying an explicit HTTP-like status from the vendor.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::kind("HttpStatusError", message).with_http_status(status)
    }

    fn from_parts(type_name: Cow<'static, str>, source: BoxError) -> Self {
        Self {
            type_name,
            status: None,
            resource_type: None,
            resource_id: None,
            source,
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the kind and id of the remote resource the call touched.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn http_status(&self) -> Option<u16> {
        self.status
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }
}

impl fmt::Debug for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolError")
            .field("type_name", &self.type_name)
            .field("status", &self.status)
            .field("resource_type", &self.resource_type)
            .field("resource_id", &self.resource_id)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {}): {}", self.type_name, status, self.source),
            None => write!(f, "{}: {}", self.type_name, self.source),
        }
    }
}

impl StdError for ToolError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|status| status.as_u16());
        let type_name: Cow<'static, str> = if error.is_timeout() {
            Cow::Borrowed("reqwest::TimeoutError")
        } else if error.is_connect() {
            Cow::Borrowed("reqwest::ConnectError")
        } else {
            Cow::Borrowed(std::any::type_name::<reqwest::Error>())
        };
        let mut tool_error = Self::from_parts(type_name, Box::new(error));
        tool_error.status = status;
        tool_error
    }
}

impl From<std::io::Error> for ToolError {
    fn from(error: std::io::Error) -> Self {
        let type_name = format!("std::io::{:?}", error.kind());
        Self::from_parts(Cow::Owned(type_name), Box::new(error))
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error)
    }
}

impl From<tokio::time::error::Elapsed> for ToolError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::from_parts(Cow::Borrowed("tokio::time::TimeoutError"), Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct InvalidTokenError;

    impl fmt::Display for InvalidTokenError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("token rejected by vendor")
        }
    }

    impl StdError for InvalidTokenError {}

    #[test]
    fn new_records_concrete_type_name() {
        let error = ToolError::new(InvalidTokenError);
        assert!(error.type_name().ends_with("InvalidTokenError"));
        assert_eq!(error.http_status(), None);
        assert!(error.to_string().contains("token rejected by vendor"));
    }

    #[test]
    fn io_errors_are_named_by_kind() {
        let error = ToolError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "read timed out",
        ));
        assert_eq!(error.type_name(), "std::io::TimedOut");
    }

    #[test]
    fn builders_attach_status_and_resource() {
        let error = ToolError::status(404, "deal 42 missing").with_resource("deal", "42");
        assert_eq!(error.http_status(), Some(404));
        assert_eq!(error.resource_type(), Some("deal"));
        assert_eq!(error.resource_id(), Some("42"));
        assert!(error.source().is_some());
    }
}
