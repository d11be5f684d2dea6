use super::*;
use serde_json::{json, Map};

fn echo_contract() -> Value {
    json!({
        "type": "object",
        "properties": { "text": { "type": "string" } },
        "required": ["text"]
    })
}

fn constant(value: &str) -> impl ToolHandler {
    let value = value.to_string();
    handler_fn(move |_args: Map<String, Value>, _ctx: ToolContext| {
        let value = value.clone();
        async move { Ok::<_, ToolError>(Value::String(value)) }
    })
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut catalog = Catalog::new();
    catalog
        .register(OperationDescriptor::new("echo", echo_contract()), constant("a"))
        .unwrap();

    let err = catalog
        .register(OperationDescriptor::new("echo", echo_contract()), constant("b"))
        .unwrap_err();
    assert_eq!(
        err,
        CatalogError::DuplicateOperation {
            name: "echo".to_string()
        }
    );
    assert_eq!(catalog.len(), 1);
}

#[test]
fn list_preserves_registration_order_and_is_stable() {
    let mut catalog = Catalog::new();
    for name in ["zeta", "alpha", "mid"] {
        catalog
            .register(
                OperationDescriptor::new(name, json!({"type": "object"})),
                constant(name),
            )
            .unwrap();
    }

    let first: Vec<OperationDescriptor> = catalog.list().into_iter().cloned().collect();
    let second: Vec<OperationDescriptor> = catalog.list().into_iter().cloned().collect();
    assert_eq!(first, second);
    assert_eq!(
        first.iter().map(|d| d.name()).collect::<Vec<_>>(),
        vec!["zeta", "alpha", "mid"]
    );

    let tool_names: Vec<String> = catalog.tools().into_iter().map(|tool| tool.name).collect();
    assert_eq!(tool_names, vec!["zeta", "alpha", "mid"]);
}

#[tokio::test]
async fn resolve_returns_the_same_handler_every_time() {
    let mut catalog = Catalog::new();
    catalog
        .register(OperationDescriptor::new("one", json!({"type": "object"})), constant("1"))
        .unwrap();
    catalog
        .register(OperationDescriptor::new("two", json!({"type": "object"})), constant("2"))
        .unwrap();

    let first = Arc::clone(catalog.resolve("two").unwrap().handler());
    let second = Arc::clone(catalog.resolve("two").unwrap().handler());
    assert!(Arc::ptr_eq(&first, &second));

    let context = ToolContext::new("two", None);
    let output = first.call(Map::new(), &context).await.unwrap();
    assert_eq!(output, json!("2"));
}

#[test]
fn unknown_name_is_a_typed_error() {
    let catalog = Catalog::new();
    for _ in 0..3 {
        assert_eq!(
            catalog.resolve("does_not_exist").unwrap_err(),
            CatalogError::UnknownOperation {
                name: "does_not_exist".to_string()
            }
        );
    }
}

#[test]
fn non_object_contract_is_rejected() {
    let mut catalog = Catalog::new();
    let err = catalog
        .register(
            OperationDescriptor::new("bad", json!({"type": "string"})),
            constant("x"),
        )
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidContract { .. }));
    assert!(catalog.is_empty());
}

#[test]
fn uncompilable_contract_is_rejected() {
    let mut catalog = Catalog::new();
    let err = catalog
        .register(
            OperationDescriptor::new(
                "bad",
                json!({"type": "object", "properties": {"n": {"type": 12}}}),
            ),
            constant("x"),
        )
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidContract { .. }));
}

#[test]
fn entry_validation_checks_required_and_types() {
    let mut catalog = Catalog::new();
    catalog
        .register(OperationDescriptor::new("echo", echo_contract()), constant("a"))
        .unwrap();
    let entry = catalog.resolve("echo").unwrap();

    assert!(entry.validate(&json!({"text": "hi"})).is_ok());
    assert!(entry.validate(&json!({})).is_err());
    assert!(entry.validate(&json!({"text": 7})).is_err());
}

#[test]
fn descriptor_renders_as_tool_with_metadata() {
    let descriptor = OperationDescriptor::new("hubspot_get_deal", echo_contract())
        .with_title("Get deal")
        .with_description("Fetch one deal")
        .with_category("crm")
        .read_only(true);

    let tool = descriptor.to_tool().unwrap();
    let rendered = serde_json::to_value(&tool).unwrap();
    assert_eq!(rendered["name"], "hubspot_get_deal");
    assert_eq!(rendered["description"], "Fetch one deal");
    assert_eq!(rendered["annotations"]["readOnlyHint"], true);
    assert_eq!(rendered["_meta"]["category"], "crm");
    assert_eq!(rendered["inputSchema"]["required"], json!(["text"]));
}
