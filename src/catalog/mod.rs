//! The operation catalog: an immutable name → handler registry.
//!
//! A [`Catalog`] is assembled once at startup through `&mut self`
//! registration, then frozen behind an `Arc`. Nothing writes to it afterwards,
//! so concurrent readers need no locking.

pub mod descriptor;
pub mod error;
pub mod handler;

pub use descriptor::{DisplayMetadata, OperationDescriptor};
pub use error::ToolError;
pub use handler::{handler_fn, FnHandler, ToolContext, ToolHandler};

use rust_mcp_schema::Tool;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    DuplicateOperation { name: String },
    UnknownOperation { name: String },
    /// The input contract is not a usable JSON Schema for an argument object.
    InvalidContract { name: String, reason: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::DuplicateOperation { name } => {
                write!(f, "Operation already registered: {name}")
            }
            CatalogError::UnknownOperation { name } => write!(f, "Unknown operation: {name}"),
            CatalogError::InvalidContract { name, reason } => {
                write!(f, "Invalid input contract for {name}: {reason}")
            }
        }
    }
}

impl StdError for CatalogError {}

/// A registered operation with its compiled contract.
pub struct CatalogEntry {
    descriptor: OperationDescriptor,
    tool: Tool,
    validator: jsonschema::Validator,
    handler: Arc<dyn ToolHandler>,
}

impl CatalogEntry {
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    /// Checks `arguments` against the input contract. The error string is for
    /// logs only; it may echo argument values.
    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        self.validator
            .validate(arguments)
            .map_err(|err| err.to_string())
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(
        &mut self,
        descriptor: OperationDescriptor,
        handler: H,
    ) -> Result<(), CatalogError>
    where
        H: ToolHandler + 'static,
    {
        self.register_shared(descriptor, Arc::new(handler))
    }

    pub fn register_shared(
        &mut self,
        descriptor: OperationDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), CatalogError> {
        let name = descriptor.name().to_string();
        if self.index.contains_key(&name) {
            return Err(CatalogError::DuplicateOperation { name });
        }
        if name.trim().is_empty() {
            return Err(CatalogError::InvalidContract {
                name,
                reason: "operation name must not be empty".to_string(),
            });
        }

        let contract = descriptor.input_contract();
        if contract.get("type").and_then(Value::as_str) != Some("object") {
            return Err(CatalogError::InvalidContract {
                name,
                reason: "input contract must be an object schema".to_string(),
            });
        }
        let validator =
            jsonschema::validator_for(contract).map_err(|err| CatalogError::InvalidContract {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        let tool = descriptor
            .to_tool()
            .map_err(|reason| CatalogError::InvalidContract {
                name: name.clone(),
                reason,
            })?;

        debug!(operation = %name, "Registered operation");
        self.index.insert(name, self.entries.len());
        self.entries.push(CatalogEntry {
            descriptor,
            tool,
            validator,
            handler,
        });
        Ok(())
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<&OperationDescriptor> {
        self.entries.iter().map(|entry| &entry.descriptor).collect()
    }

    /// Advertised tools in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.entries.iter().map(|entry| entry.tool.clone()).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<&CatalogEntry, CatalogError> {
        self.index
            .get(name)
            .and_then(|index| self.entries.get(*index))
            .ok_or_else(|| CatalogError::UnknownOperation {
                name: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.resolve(name).ok().map(CatalogEntry::descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.descriptor.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests;
