//! Template resolution for node configs.
//!
//! `{{#nodeId.path#}}` reads a finished node's output, `{{$NAME$}}` reads a
//! configured env value. Paths are dot separated, numeric segments index
//! into arrays.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{HookflowError, Result, runtime::Context};

/// Format: `{{#nodeId.key#}}` or `{{#nodeId.key.subkey#}}`
static OUTPUT_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{#([^.#]+)\.([^#]+)#\}\}").unwrap());
/// Format: `{{$VAR_NAME$}}`
static ENV_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\$([^$]+)\$\}\}").unwrap());

fn lookup_output(
    ctx: &Context,
    node_id: &str,
    path: &str,
) -> Option<Value> {
    let mut current = ctx.execution().output(node_id)?;
    for key in path.split('.') {
        current = match current {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            other => other.get(key)?,
        };
    }
    Some(current.clone())
}

fn to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Replaces every template in `template`.
///
/// Fails listing every reference that could not be resolved.
pub fn resolve_template(
    ctx: &Context,
    template: &str,
) -> Result<String> {
    let mut result = template.to_string();
    let mut errors: Vec<String> = Vec::new();

    for caps in ENV_TEMPLATE.captures_iter(template) {
        match ctx.env().get(&caps[1]) {
            Some(value) => result = result.replace(&caps[0], value),
            None => errors.push(format!("env variable '{}' not found", &caps[1])),
        }
    }

    for caps in OUTPUT_TEMPLATE.captures_iter(template) {
        match lookup_output(ctx, &caps[1], &caps[2]) {
            Some(value) => result = result.replace(&caps[0], &to_text(value)),
            None => errors.push(format!("variable '{}' not found", &caps[0])),
        }
    }

    if !errors.is_empty() {
        return Err(HookflowError::Action(errors.join(", ")));
    }
    Ok(result)
}

/// Resolves a string that is exactly one output reference to the referenced
/// value itself, keeping its JSON type. Other strings resolve as text.
pub fn resolve_value(
    ctx: &Context,
    template: &str,
) -> Result<Value> {
    if let Some(caps) = OUTPUT_TEMPLATE.captures(template)
        && caps[0].len() == template.len()
    {
        return lookup_output(ctx, &caps[1], &caps[2]).ok_or_else(|| HookflowError::Action(format!("variable '{}' not found", template)));
    }
    resolve_template(ctx, template).map(Value::String)
}

/// Resolves templates in every string of a JSON value.
pub fn resolve_json_value(
    ctx: &Context,
    value: &Value,
) -> Result<Value> {
    match value {
        Value::String(s) => resolve_value(ctx, s),
        Value::Array(arr) => Ok(Value::Array(arr.iter().map(|v| resolve_json_value(ctx, v)).collect::<Result<Vec<_>>>()?)),
        Value::Object(obj) => {
            let resolved = obj.iter().map(|(k, v)| resolve_json_value(ctx, v).map(|rv| (k.clone(), rv))).collect::<Result<serde_json::Map<String, Value>>>()?;
            Ok(Value::Object(resolved))
        }
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::{Value, json};

    use super::*;
    use crate::{
        gateway::{Capabilities, StoreGateway},
        model::NodeModel,
        runtime::{ExecutionContext, NodeRun},
        store::{DbStore, MemStore, Store},
        workflow::Node,
    };

    fn create_test_context(outputs: &[(&str, Value)]) -> Context {
        let mut execution = ExecutionContext::new();
        for (id, output) in outputs {
            execution.insert(
                id,
                NodeRun {
                    output: output.clone(),
                    logs: vec![],
                    timestamp: 0,
                    error: None,
                },
            );
        }
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        let caps = Capabilities::new(None, Arc::new(StoreGateway::new(Arc::new(store))), reqwest::Client::new());
        let env = HashMap::from([("HOST".to_string(), "localhost".to_string()), ("PORT".to_string(), "8080".to_string())]);
        let node = Node::from(&NodeModel {
            id: "n".to_string(),
            node_type: "set".to_string(),
            ..Default::default()
        });
        Context::new(node, Value::Null, execution, Arc::new(env), caps)
    }

    #[test]
    fn test_resolve_template_no_variables() {
        let ctx = create_test_context(&[]);
        assert_eq!(resolve_template(&ctx, "hello world").unwrap(), "hello world");
    }

    #[test]
    fn test_resolve_template_nested_output() {
        let ctx = create_test_context(&[("node1", json!({"data": {"user": {"name": "Alice"}}}))]);
        assert_eq!(resolve_template(&ctx, "{{#node1.data.user.name#}}").unwrap(), "Alice");
    }

    #[test]
    fn test_resolve_template_array_index() {
        let ctx = create_test_context(&[("node1", json!({"items": [{"id": 7}, {"id": 9}]}))]);
        assert_eq!(resolve_template(&ctx, "id={{#node1.items.1.id#}}").unwrap(), "id=9");
    }

    #[test]
    fn test_resolve_template_multiple_outputs() {
        let ctx = create_test_context(&[("node1", json!({"name": "Alice"})), ("node2", json!({"age": 30}))]);
        assert_eq!(resolve_template(&ctx, "{{#node1.name#}} is {{#node2.age#}} years old").unwrap(), "Alice is 30 years old");
    }

    #[test]
    fn test_resolve_template_missing_reference() {
        let ctx = create_test_context(&[("node1", json!({"name": "Alice"}))]);
        let err = resolve_template(&ctx, "{{#node1.unknown#}} {{#ghost.x#}}").unwrap_err();
        assert!(err.to_string().contains("node1.unknown"));
        assert!(err.to_string().contains("ghost.x"));
    }

    #[test]
    fn test_resolve_template_env_variables() {
        let ctx = create_test_context(&[]);
        assert_eq!(resolve_template(&ctx, "http://{{$HOST$}}:{{$PORT$}}/api").unwrap(), "http://localhost:8080/api");
        assert!(resolve_template(&ctx, "{{$MISSING$}}").unwrap_err().to_string().contains("env variable"));
    }

    #[test]
    fn test_resolve_json_value_keeps_types() {
        let ctx = create_test_context(&[("node1", json!({"obj": {"foo": "bar"}, "n": 25, "name": "Alice"}))]);
        let input = json!({
            "whole": "{{#node1.obj#}}",
            "count": "{{#node1.n#}}",
            "text": "hi {{#node1.name#}}",
            "list": ["{{#node1.name#}}", 1, true, null]
        });
        let resolved = resolve_json_value(&ctx, &input).unwrap();
        assert_eq!(
            resolved,
            json!({
                "whole": {"foo": "bar"},
                "count": 25,
                "text": "hi Alice",
                "list": ["Alice", 1, true, null]
            })
        );
    }
}
