//! Transport-neutral call execution.
//!
//! The [`Dispatcher`] resolves a call against the catalog, validates its
//! arguments, runs the handler inside the caller's credential scope, and
//! folds the outcome into a [`ResultEnvelope`]. Resolution and validation
//! failures are classified here directly; handler failures go through
//! [`sanitize`] exactly once.

pub mod sanitize;

pub use sanitize::{sanitize, ErrorCode, SanitizedError};

use crate::catalog::{Catalog, OperationDescriptor, ToolContext};
use crate::core::credential::{self, Credential};
use crate::core::lifespan::HttpClientPool;
use futures_util::FutureExt;
use rust_mcp_schema::{CallToolResult, TextContent, Tool};
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A parsed inbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEnvelope {
    pub operation_name: String,
    pub arguments: Map<String, Value>,
}

impl CallEnvelope {
    pub fn new(operation_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            operation_name: operation_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope {
    Success(Value),
    Failure(SanitizedError),
}

impl ResultEnvelope {
    pub fn is_success(&self) -> bool {
        matches!(self, ResultEnvelope::Success(_))
    }

    /// The text placed in the single content block.
    pub fn to_text(&self) -> String {
        match self {
            ResultEnvelope::Success(Value::String(text)) => text.clone(),
            ResultEnvelope::Success(payload) => serde_json::to_string_pretty(payload)
                .unwrap_or_else(|_| payload.to_string()),
            ResultEnvelope::Failure(error) => error.to_json(),
        }
    }

    pub fn into_call_tool_result(self) -> CallToolResult {
        let mut result =
            CallToolResult::text_content(vec![TextContent::new(self.to_text(), None, None)]);
        if !self.is_success() {
            result.is_error = Some(true);
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub struct Dispatcher {
    catalog: Arc<Catalog>,
    server_info: ServerInfo,
    http: Option<Arc<HttpClientPool>>,
}

impl Dispatcher {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            server_info: ServerInfo::default(),
            http: None,
        }
    }

    pub fn with_server_info(mut self, server_info: ServerInfo) -> Self {
        self.server_info = server_info;
        self
    }

    pub fn with_http_pool(mut self, pool: Arc<HttpClientPool>) -> Self {
        self.http = Some(pool);
        self
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Descriptors for a capability query, in registration order.
    pub fn advertise(&self) -> Vec<&OperationDescriptor> {
        self.catalog.list()
    }

    pub fn advertised_tools(&self) -> Vec<Tool> {
        self.catalog.tools()
    }

    pub async fn invoke(&self, call: CallEnvelope) -> ResultEnvelope {
        // Handlers must never run unscoped; bind the empty identity if a
        // caller forgot to open a scope.
        if credential::try_current().is_none() {
            warn!(operation = %call.operation_name, "Invoke without credential scope; binding empty credential");
            return credential::with_credential(Credential::empty(), self.invoke_scoped(call))
                .await;
        }
        self.invoke_scoped(call).await
    }

    async fn invoke_scoped(&self, call: CallEnvelope) -> ResultEnvelope {
        let CallEnvelope {
            operation_name,
            arguments,
        } = call;

        let entry = match self.catalog.resolve(&operation_name) {
            Ok(entry) => entry,
            Err(err) => {
                debug!(operation = %operation_name, %err, "Rejected call");
                return ResultEnvelope::Failure(
                    SanitizedError::new(ErrorCode::UnknownOperation)
                        .with_resource(Some("operation"), Some(&operation_name)),
                );
            }
        };

        let arguments = Value::Object(arguments);
        if let Err(problem) = entry.validate(&arguments) {
            debug!(operation = %operation_name, %problem, "Arguments failed input contract");
            return ResultEnvelope::Failure(
                SanitizedError::new(ErrorCode::InvalidInput)
                    .with_resource(Some("operation"), Some(&operation_name)),
            );
        }
        let Value::Object(arguments) = arguments else {
            return ResultEnvelope::Failure(SanitizedError::new(ErrorCode::InvalidInput));
        };

        let context = ToolContext::new(
            &operation_name,
            self.http.as_ref().and_then(|pool| pool.client()),
        );
        debug!(operation = %operation_name, "Invoking handler");
        let outcome = AssertUnwindSafe(entry.handler().call(arguments, &context))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(payload)) => ResultEnvelope::Success(payload),
            Ok(Err(failure)) => ResultEnvelope::Failure(sanitize(
                &failure,
                failure.resource_type(),
                failure.resource_id(),
            )),
            Err(_) => {
                error!(operation = %operation_name, "Handler panicked");
                ResultEnvelope::Failure(SanitizedError::new(ErrorCode::OperationFailed))
            }
        }
    }
}
