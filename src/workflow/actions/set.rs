use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    HookflowError, Result,
    runtime::Context,
    workflow::{
        actions::{Action, ActionType},
        template,
    },
};

/// Writes fixed or templated values over the first input item.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SetAction {
    values: Map<String, Value>,
    /// drop the input fields and output only `values`
    #[serde(default)]
    keep_only_set: bool,
}

#[async_trait]
impl Action for SetAction {
    fn create(params: Value) -> Result<Self> {
        jsonschema::validate(&Self::schema(), &params)?;
        serde_json::from_value::<Self>(params).map_err(|e| HookflowError::NodeCompile(format!("invalid set node config: {}", e)))
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["values"],
            "properties": {
                "values": {
                    "type": "object",
                    "description": "Fields to set, string values support template variables"
                },
                "keepOnlySet": { "type": "boolean" }
            }
        })
    }

    fn action_type(&self) -> ActionType {
        ActionType::Set
    }

    async fn run(
        &self,
        ctx: Arc<Context>,
    ) -> Result<Value> {
        let mut output = match ctx.first_item() {
            Value::Object(fields) if !self.keep_only_set => fields.clone(),
            _ => Map::new(),
        };
        for (key, value) in &self.values {
            output.insert(key.clone(), template::resolve_json_value(&ctx, value)?);
        }
        Ok(Value::Object(output))
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::{Value, json};

    use super::SetAction;
    use crate::{
        gateway::{Capabilities, StoreGateway},
        model::NodeModel,
        runtime::{Context, ExecutionContext, NodeRun},
        store::{DbStore, MemStore, Store},
        workflow::{Node, actions::Action},
    };

    fn context(input: Value) -> Arc<Context> {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        let caps = Capabilities::new(None, Arc::new(StoreGateway::new(Arc::new(store))), reqwest::Client::new());
        let mut execution = ExecutionContext::new();
        execution.insert(
            "trigger",
            NodeRun {
                output: json!({"body": {"plan": "pro"}}),
                logs: vec![],
                timestamp: 0,
                error: None,
            },
        );
        let node = Node::from(&NodeModel {
            id: "s".to_string(),
            node_type: "set".to_string(),
            ..Default::default()
        });
        Arc::new(Context::new(node, input, execution, Arc::new(HashMap::new()), caps))
    }

    #[tokio::test]
    async fn test_set_merges_over_input() {
        let action = SetAction::create(json!({"values": {"plan": "{{#trigger.body.plan#}}", "seen": true}})).unwrap();
        let output = action.run(context(json!({"id": 1, "seen": false}))).await.unwrap();
        assert_eq!(output, json!({"id": 1, "seen": true, "plan": "pro"}));
    }

    #[tokio::test]
    async fn test_set_keep_only_set() {
        let action = SetAction::create(json!({"values": {"a": 1}, "keepOnlySet": true})).unwrap();
        let output = action.run(context(json!({"id": 1}))).await.unwrap();
        assert_eq!(output, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_set_on_non_object_input() {
        let action = SetAction::create(json!({"values": {"a": 1}})).unwrap();
        assert_eq!(action.run(context(json!("text"))).await.unwrap(), json!({"a": 1}));
    }
}
