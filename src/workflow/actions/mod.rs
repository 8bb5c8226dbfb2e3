pub mod code;
pub mod http_request;
pub mod set;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, runtime::Context, workflow::Node};

pub use code::CodeAction;
pub use http_request::HttpRequestAction;
pub use set::SetAction;

/// Node types with a built-in implementation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    WebhookTrigger,
    ChatTrigger,
    FormTrigger,
    NoOp,
    Code,
    HttpRequest,
    Set,
}

impl ActionType {
    pub fn is_trigger(&self) -> bool {
        matches!(self, ActionType::WebhookTrigger | ActionType::ChatTrigger | ActionType::FormTrigger)
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    /// Creates a new instance of the action from the node config.
    ///
    /// Fails when the config does not match [`Action::schema`].
    fn create(params: Value) -> Result<Self>
    where
        Self: Sized;

    /// JSON schema the node config must satisfy.
    fn schema() -> Value
    where
        Self: Sized;

    fn action_type(&self) -> ActionType;

    /// Runs the node logic and returns its output.
    ///
    /// Log calls go to the context, see [`Context::log`].
    async fn run(
        &self,
        ctx: Arc<Context>,
    ) -> Result<Value>;
}

/// Instantiates the logic of `node`.
///
/// `Ok(None)` means the node has no logic and passes its input through:
/// trigger nodes, `no_op`, unknown types and code nodes with an empty body.
pub fn create_action(node: &Node) -> Result<Option<Box<dyn Action>>> {
    let Some(action_type) = node.action_type else {
        return Ok(None);
    };
    let params: Value = node.config.clone().into();
    match action_type {
        ActionType::WebhookTrigger | ActionType::ChatTrigger | ActionType::FormTrigger | ActionType::NoOp => Ok(None),
        ActionType::Code if CodeAction::is_empty(&params) => Ok(None),
        ActionType::Code => Ok(Some(Box::new(CodeAction::create(params)?))),
        ActionType::HttpRequest => Ok(Some(Box::new(HttpRequestAction::create(params)?))),
        ActionType::Set => Ok(Some(Box::new(SetAction::create(params)?))),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{ActionType, create_action};
    use crate::{model::NodeModel, workflow::Node};

    fn node(
        node_type: &str,
        config: serde_json::Value,
    ) -> Node {
        Node::from(&NodeModel {
            id: "n".to_string(),
            node_type: node_type.to_string(),
            name: None,
            config: config.into(),
        })
    }

    #[test]
    fn test_pass_through_types() {
        assert!(create_action(&node("webhook_trigger", json!({"webhookId": "wh1"}))).unwrap().is_none());
        assert!(create_action(&node("no_op", json!({}))).unwrap().is_none());
        assert!(create_action(&node("crm_sync", json!({}))).unwrap().is_none());
        assert!(create_action(&node("code", json!({"code": "  "}))).unwrap().is_none());
    }

    #[test]
    fn test_builtin_types() {
        let action = create_action(&node("code", json!({"code": "return 1;"}))).unwrap().unwrap();
        assert_eq!(action.action_type(), ActionType::Code);

        let action = create_action(&node("set", json!({"values": {"a": 1}}))).unwrap().unwrap();
        assert_eq!(action.action_type(), ActionType::Set);
    }

    #[test]
    fn test_invalid_config_is_compile_error() {
        let err = create_action(&node("http_request", json!({"method": "GET"}))).err().unwrap();
        assert!(matches!(err, crate::HookflowError::NodeCompile(_)));
    }
}
