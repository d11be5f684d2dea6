//! Built-in diagnostic operations.
//!
//! Vendor integrations register their own operations through the same
//! [`Catalog`] API; these two exist so a bare gateway can be smoke-tested.

use crate::catalog::{handler_fn, Catalog, CatalogError, OperationDescriptor, ToolError};
use serde_json::{json, Value};

pub const ECHO: &str = "echo";
pub const WHOAMI: &str = "whoami";

pub fn register_builtin(catalog: &mut Catalog) -> Result<(), CatalogError> {
    catalog.register(
        OperationDescriptor::new(
            ECHO,
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to return unchanged" }
                },
                "required": ["text"],
                "additionalProperties": false
            }),
        )
        .with_title("Echo")
        .with_description("Return the given text unchanged.")
        .with_category("diagnostics")
        .read_only(true),
        handler_fn(|arguments, _ctx| async move {
            match arguments.get("text") {
                Some(Value::String(text)) => Ok(Value::String(text.clone())),
                _ => Err(ToolError::kind("InvalidArgument", "text must be a string")),
            }
        }),
    )?;

    // Reports whether a credential is bound; never echoes it.
    catalog.register(
        OperationDescriptor::new(
            WHOAMI,
            json!({ "type": "object", "properties": {}, "additionalProperties": false }),
        )
        .with_title("Who am I")
        .with_description("Report whether the caller presented a credential.")
        .with_category("diagnostics")
        .read_only(true),
        handler_fn(|_arguments, ctx| async move {
            Ok::<_, ToolError>(json!({
                "authenticated": !ctx.credential().is_empty(),
                "operation": ctx.operation_name(),
            }))
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credential::{with_credential, Credential};
    use crate::dispatch::{CallEnvelope, Dispatcher, ErrorCode, ResultEnvelope};
    use serde_json::Map;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        let mut catalog = Catalog::new();
        register_builtin(&mut catalog).unwrap();
        Dispatcher::new(Arc::new(catalog))
    }

    fn arguments(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn builtins_register_in_order() {
        let dispatcher = dispatcher();
        let names: Vec<&str> = dispatcher.advertise().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec![ECHO, WHOAMI]);
        assert!(dispatcher.advertise().iter().all(|d| d.metadata().read_only));
    }

    #[test]
    fn registering_twice_is_a_duplicate() {
        let mut catalog = Catalog::new();
        register_builtin(&mut catalog).unwrap();
        assert!(matches!(
            register_builtin(&mut catalog),
            Err(CatalogError::DuplicateOperation { .. })
        ));
    }

    #[tokio::test]
    async fn echo_rejects_extra_arguments() {
        let result = with_credential(
            Credential::empty(),
            dispatcher().invoke(CallEnvelope::new(
                ECHO,
                arguments(json!({"text": "hi", "extra": 1})),
            )),
        )
        .await;
        assert!(matches!(
            result,
            ResultEnvelope::Failure(ref error) if error.code == ErrorCode::InvalidInput
        ));
    }

    #[tokio::test]
    async fn whoami_reports_authentication_without_the_token() {
        let dispatcher = dispatcher();
        let result = with_credential(
            Credential::new("T1-secret"),
            dispatcher.invoke(CallEnvelope::new(WHOAMI, Map::new())),
        )
        .await;
        assert!(!result.to_text().contains("T1-secret"));
        match result {
            ResultEnvelope::Success(payload) => assert_eq!(payload["authenticated"], true),
            other => panic!("expected success, got {other:?}"),
        }

        let anonymous = with_credential(
            Credential::empty(),
            dispatcher.invoke(CallEnvelope::new(WHOAMI, Map::new())),
        )
        .await;
        assert_eq!(
            anonymous,
            ResultEnvelope::Success(json!({"authenticated": false, "operation": WHOAMI}))
        );
    }
}
