use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    HookflowError, Result,
    runtime::Context,
    workflow::actions::{Action, ActionType},
};

use super::sandbox::{Sandbox, SandboxInput};

/// JavaScript node. The body runs as an async function inside QuickJS.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CodeAction {
    #[serde(alias = "jsCode")]
    code: String,
    /// credential ids the body may read through `$credentials.get`
    #[serde(default)]
    credentials: Vec<String>,
}

impl CodeAction {
    /// Whether the config has no body to run.
    pub fn is_empty(params: &Value) -> bool {
        ["code", "jsCode"].iter().all(|key| params.get(key).and_then(Value::as_str).is_none_or(|s| s.trim().is_empty()))
    }

    /// Fetches the allow-listed credentials up front, the script itself
    /// cannot await the gateway.
    async fn resolve_credentials(
        &self,
        ctx: &Context,
    ) -> Result<HashMap<String, Value>> {
        let mut resolved = HashMap::new();
        if ctx.capabilities().identity().is_none() {
            return Ok(resolved);
        }
        for id in &self.credentials {
            if let Some(credential) = ctx.capabilities().credential(id).await? {
                resolved.insert(id.clone(), credential.data);
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Action for CodeAction {
    fn create(params: Value) -> Result<Self> {
        jsonschema::validate(&Self::schema(), &params)?;
        serde_json::from_value::<Self>(params).map_err(|e| HookflowError::NodeCompile(format!("invalid code node config: {}", e)))
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Body of an async function, may `return` the node output"
                },
                "jsCode": { "type": "string" },
                "credentials": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Credential ids readable through $credentials.get"
                }
            },
            "anyOf": [
                { "required": ["code"] },
                { "required": ["jsCode"] }
            ]
        })
    }

    fn action_type(&self) -> ActionType {
        ActionType::Code
    }

    async fn run(
        &self,
        ctx: Arc<Context>,
    ) -> Result<Value> {
        let input = SandboxInput {
            node: serde_json::to_value(ctx.node())?,
            items: ctx.items().to_vec(),
            context: serde_json::to_value(ctx.execution())?,
            env: serde_json::to_value(ctx.env())?,
            credentials: self.resolve_credentials(&ctx).await?,
            authenticated: ctx.capabilities().identity().is_some(),
        };
        let sandbox = Sandbox {
            timeout: ctx.sandbox().node_timeout_ms.map(Duration::from_millis),
            memory_limit: ctx.sandbox().memory_limit_bytes,
        };
        let code = self.code.clone();

        let (result, logs) = tokio::task::spawn_blocking(move || sandbox.run(&code, &input)).await.map_err(|e| HookflowError::NodeRuntime(format!("sandbox task failed: {}", e)))?;
        ctx.extend_logs(logs);
        result
    }
}
