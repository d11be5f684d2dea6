use crate::catalog::error::ToolError;
use crate::core::credential::{self, Credential};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Everything a handler may know about the call it is serving.
#[derive(Clone, Debug)]
pub struct ToolContext {
    operation: Arc<str>,
    http: Option<reqwest::Client>,
}

impl ToolContext {
    pub fn new(operation: &str, http: Option<reqwest::Client>) -> Self {
        Self {
            operation: Arc::from(operation),
            http,
        }
    }

    pub fn operation_name(&self) -> &str {
        &self.operation
    }

    /// The credential of the caller this handler is running for.
    pub fn credential(&self) -> Credential {
        credential::current()
    }

    /// Shared outbound client, present while the gateway lifespan is running.
    pub fn http(&self) -> Option<&reqwest::Client> {
        self.http.as_ref()
    }
}

/// A single operation implementation.
///
/// Handlers receive already-validated arguments and return a JSON payload.
/// Transport, credential scoping, and catalog registration belong to the
/// gateway; a handler only reads [`ToolContext::credential`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Map<String, Value>, context: &ToolContext)
        -> Result<Value, ToolError>;
}

/// Adapts an async closure into a [`ToolHandler`].
pub struct FnHandler<F> {
    handler: F,
}

pub fn handler_fn<F, Fut>(handler: F) -> FnHandler<F>
where
    F: Fn(Map<String, Value>, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    FnHandler { handler }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn call(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<Value, ToolError> {
        (self.handler)(arguments, context.clone()).await
    }
}
