use rust_mcp_schema::Tool;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Human-facing metadata advertised alongside an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayMetadata {
    pub title: Option<String>,
    pub description: String,
    pub category: Option<String>,
    /// The operation never mutates remote state.
    pub read_only: bool,
}

/// Immutable description of one callable operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    name: String,
    input_contract: Value,
    metadata: DisplayMetadata,
}

impl OperationDescriptor {
    /// `input_contract` is a JSON Schema object describing the arguments.
    pub fn new(name: impl Into<String>, input_contract: Value) -> Self {
        Self {
            name: name.into(),
            input_contract,
            metadata: DisplayMetadata::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = Some(category.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.metadata.read_only = read_only;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_contract(&self) -> &Value {
        &self.input_contract
    }

    pub fn metadata(&self) -> &DisplayMetadata {
        &self.metadata
    }

    /// Renders the descriptor as the MCP tool advertised to clients.
    pub fn to_tool(&self) -> Result<Tool, String> {
        let mut annotations = Map::new();
        annotations.insert("readOnlyHint".to_string(), json!(self.metadata.read_only));
        if let Some(title) = &self.metadata.title {
            annotations.insert("title".to_string(), json!(title));
        }

        let mut tool = Map::new();
        tool.insert("name".to_string(), json!(self.name));
        tool.insert("description".to_string(), json!(self.metadata.description));
        tool.insert("inputSchema".to_string(), self.input_contract.clone());
        tool.insert("annotations".to_string(), Value::Object(annotations));
        if let Some(title) = &self.metadata.title {
            tool.insert("title".to_string(), json!(title));
        }
        if let Some(category) = &self.metadata.category {
            tool.insert("_meta".to_string(), json!({ "category": category }));
        }

        serde_json::from_value(Value::Object(tool)).map_err(|err| err.to_string())
    }
}
