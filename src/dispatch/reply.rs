//! Reply extraction for chat triggers.

use std::collections::HashMap;

use serde_json::Value;

use crate::{model::WorkflowModel, runtime::ExecutionContext, workflow::Node};

/// Output fields that likely hold a chat answer, in lookup order.
const REPLY_FIELDS: [&str; 8] = ["message", "response", "text", "output", "reply", "content", "answer", "result"];

pub const NO_RESPONSE: &str = "No response";

fn pick(output: &Value) -> Option<Value> {
    match output {
        Value::String(s) => Some(Value::String(s.clone())),
        Value::Object(map) => REPLY_FIELDS.iter().find_map(|f| map.get(*f).filter(|v| !v.is_null()).cloned()),
        _ => None,
    }
}

/// Reply of a chat run: the last finished non-trigger node's output, then
/// the trigger node's output, then [`NO_RESPONSE`].
pub fn extract_reply(
    workflow: &WorkflowModel,
    ctx: &ExecutionContext,
) -> Value {
    let triggers: HashMap<&str, bool> = workflow.nodes.iter().map(|n| (n.id.as_str(), Node::from(n).is_trigger())).collect();
    let is_trigger = |id: &str| triggers.get(id).copied().unwrap_or(false);

    if let Some((_, run)) = ctx.iter().rev().find(|(id, run)| !is_trigger(id) && !run.output.is_null()) {
        return pick(&run.output).unwrap_or_else(|| run.output.clone());
    }
    if let Some((_, run)) = ctx.iter().find(|(id, run)| is_trigger(id) && !run.output.is_null()) {
        return pick(&run.output).unwrap_or_else(|| run.output.clone());
    }
    Value::String(NO_RESPONSE.to_string())
}
