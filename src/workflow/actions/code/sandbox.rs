//! QuickJS sandbox for code nodes.
//!
//! Each invocation gets a fresh runtime whose only globals besides the
//! language builtins are the injected `$`-prefixed values and `console`.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use rquickjs::{Context as JsContext, Ctx, FromJs, Runtime as JsRuntime, convert::Coerced};
use serde::Serialize;
use serde_json::Value;

use crate::{HookflowError, Result, runtime::LogEntry};

const MAX_STACK_SIZE: usize = 512 * 1024;

/// Installs `console` so that log calls are collected in `__logs`.
const PRELUDE: &str = r#"
globalThis.__logs = [];
globalThis.__done = false;
(function () {
    const fmt = (v) => (typeof v === "string" ? v : JSON.stringify(v));
    const push = (level) => (...args) => {
        __logs.push({ level, message: args.map(fmt).join(" "), timestamp: Date.now() });
    };
    globalThis.console = { log: push("log"), info: push("info"), warn: push("warn"), error: push("error") };
})();
"#;

/// Everything the script can see, serialized into the runtime as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct SandboxInput {
    pub node: Value,
    pub items: Vec<Value>,
    pub context: Value,
    pub env: Value,
    pub credentials: HashMap<String, Value>,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Sandbox {
    pub timeout: Option<Duration>,
    pub memory_limit: usize,
}

impl Sandbox {
    /// Compiles `body` as an async function and awaits it.
    ///
    /// The collected log entries are returned whether or not the body
    /// succeeded.
    pub fn run(
        &self,
        body: &str,
        input: &SandboxInput,
    ) -> (Result<Value>, Vec<LogEntry>) {
        let rt = match JsRuntime::new() {
            Ok(rt) => rt,
            Err(e) => return (Err(HookflowError::NodeRuntime(e.to_string())), Vec::new()),
        };
        rt.set_memory_limit(self.memory_limit);
        rt.set_max_stack_size(MAX_STACK_SIZE);
        let started = Instant::now();
        if let Some(timeout) = self.timeout {
            let deadline = started + timeout;
            rt.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));
        }
        let ctx = match JsContext::full(&rt) {
            Ok(ctx) => ctx,
            Err(e) => return (Err(HookflowError::NodeRuntime(e.to_string())), Vec::new()),
        };

        let begun = ctx.with(|ctx| self.start(&ctx, body, input, started));
        if let Err(e) = begun {
            let logs = ctx.with(|ctx| collect_logs(&ctx));
            return (Err(e), logs);
        }

        // drive the promise returned by the body to completion
        let drained = loop {
            match rt.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(e) => break Err(self.interrupted_or(started, e.to_string())),
            }
        };

        ctx.with(|ctx| {
            let logs = collect_logs(&ctx);
            let result = drained.and_then(|_| self.settle(&ctx));
            (result, logs)
        })
    }

    fn start(
        &self,
        ctx: &Ctx<'_>,
        body: &str,
        input: &SandboxInput,
        started: Instant,
    ) -> Result<()> {
        ctx.eval::<(), _>(PRELUDE).map_err(|e| HookflowError::NodeRuntime(caught(ctx, e)))?;

        let compile = format!("globalThis.__node_fn = async function ($node, $json, $items, $input, $context, $env, $credentials) {{\n{}\n}};", body);
        ctx.eval::<(), _>(compile).map_err(|e| HookflowError::NodeCompile(caught(ctx, e)))?;

        let data = serde_json::to_string(input)?;
        let invoke = format!(
            r#"(function () {{
    const data = JSON.parse({data});
    const items = data.items;
    const $input = {{
        first: () => items[0],
        last: () => items[items.length - 1],
        all: () => items,
        item: (n) => items[n],
    }};
    const $credentials = {{
        get: (id) => {{
            if (!data.authenticated) throw new Error("not authorized: credential '" + id + "' needs an authenticated user");
            if (!Object.prototype.hasOwnProperty.call(data.credentials, id)) throw new Error("credential '" + id + "' is not available to this node");
            return data.credentials[id];
        }},
    }};
    __node_fn(data.node, items[0], items, $input, data.context, data.env, $credentials).then(
        (v) => {{ globalThis.__result = JSON.stringify(v === undefined ? null : v); globalThis.__done = true; }},
        (e) => {{ globalThis.__error = e && e.message !== undefined ? String(e.message) : String(e); globalThis.__done = true; }},
    );
}})();"#,
            data = serde_json::to_string(&data)?
        );
        ctx.eval::<(), _>(invoke).map_err(|e| self.interrupted_or(started, caught(ctx, e)))
    }

    fn settle(
        &self,
        ctx: &Ctx<'_>,
    ) -> Result<Value> {
        let globals = ctx.globals();
        let done: bool = globals.get("__done").unwrap_or(false);
        if !done {
            return Err(HookflowError::NodeRuntime("node logic never settled its result".to_string()));
        }
        if let Ok(Some(message)) = globals.get::<_, Option<String>>("__error") {
            return Err(HookflowError::NodeRuntime(message));
        }
        match globals.get::<_, Option<String>>("__result") {
            Ok(Some(text)) => Ok(serde_json::from_str(&text)?),
            _ => Ok(Value::Null),
        }
    }

    /// Reports a failure past the deadline as a timeout.
    fn interrupted_or(
        &self,
        started: Instant,
        message: String,
    ) -> HookflowError {
        match self.timeout {
            Some(timeout) if started.elapsed() >= timeout => HookflowError::NodeRuntime(format!("node logic timed out after {} ms", timeout.as_millis())),
            _ => HookflowError::NodeRuntime(message),
        }
    }
}

/// Message of the pending exception, or of `err` when nothing was thrown.
fn caught(
    ctx: &Ctx<'_>,
    err: rquickjs::Error,
) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }
    let value = ctx.catch();
    if let Some(exception) = value.as_exception() {
        return exception.message().unwrap_or_else(|| "uncaught exception".to_string());
    }
    Coerced::<String>::from_js(ctx, value).map(|s| s.0).unwrap_or_else(|_| "uncaught exception".to_string())
}

fn collect_logs(ctx: &Ctx<'_>) -> Vec<LogEntry> {
    ctx.eval::<String, _>("JSON.stringify(globalThis.__logs || [])").ok().and_then(|text| serde_json::from_str(&text).ok()).unwrap_or_default()
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, time::Duration};

    use serde_json::{Value, json};

    use super::{Sandbox, SandboxInput};
    use crate::{HookflowError, runtime::LogLevel};

    fn sandbox() -> Sandbox {
        Sandbox {
            timeout: None,
            memory_limit: 32 * 1024 * 1024,
        }
    }

    fn input(items: Vec<Value>) -> SandboxInput {
        SandboxInput {
            node: json!({"id": "n1", "type": "code"}),
            items,
            context: json!({"t": {"output": {"a": 1}}}),
            env: json!({"REGION": "eu"}),
            credentials: HashMap::new(),
            authenticated: false,
        }
    }

    #[test]
    fn test_returns_value_and_logs() {
        let (result, logs) = sandbox().run(r#"console.log("got", $json.a); console.warn({x: 1}); return { doubled: $json.a * 2, env: $env.REGION };"#, &input(vec![json!({"a": 21})]));
        assert_eq!(result.unwrap(), json!({"doubled": 42, "env": "eu"}));
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].level, LogLevel::Log);
        assert_eq!(logs[0].message, "got 21");
        assert_eq!(logs[1].message, r#"{"x":1}"#);
    }

    #[test]
    fn test_input_helpers_and_context() {
        let (result, _) = sandbox().run(
            "return [$input.first().v, $input.last().v, $input.all().length, $input.item(1).v, $items.length, $node.id, $context.t.output.a];",
            &input(vec![json!({"v": 1}), json!({"v": 2}), json!({"v": 3})]),
        );
        assert_eq!(result.unwrap(), json!([1, 3, 3, 2, 3, "n1", 1]));
    }

    #[test]
    fn test_async_body() {
        let (result, _) = sandbox().run("const v = await Promise.resolve(5); return { v };", &input(vec![json!({})]));
        assert_eq!(result.unwrap(), json!({"v": 5}));
    }

    #[test]
    fn test_no_return_is_null() {
        let (result, _) = sandbox().run("const x = 1;", &input(vec![json!({})]));
        assert_eq!(result.unwrap(), Value::Null);
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let (result, _) = sandbox().run("return {", &input(vec![json!({})]));
        assert!(matches!(result, Err(HookflowError::NodeCompile(_))));
    }

    #[test]
    fn test_throw_is_runtime_error_with_logs() {
        let (result, logs) = sandbox().run(r#"console.error("about to fail"); throw new Error("bad input");"#, &input(vec![json!({})]));
        assert_eq!(result.unwrap_err(), HookflowError::NodeRuntime("bad input".to_string()));
        assert_eq!(logs[0].level, LogLevel::Error);
    }

    #[test]
    fn test_credentials_require_identity() {
        let (result, _) = sandbox().run(r#"return $credentials.get("stripe");"#, &input(vec![json!({})]));
        assert!(result.unwrap_err().to_string().contains("not authorized"));

        let mut authed = input(vec![json!({})]);
        authed.authenticated = true;
        authed.credentials.insert("stripe".to_string(), json!({"apiKey": "sk"}));
        let (result, _) = sandbox().run(r#"return $credentials.get("stripe").apiKey;"#, &authed);
        assert_eq!(result.unwrap(), json!("sk"));

        let (result, _) = sandbox().run(r#"return $credentials.get("github");"#, &authed);
        assert!(result.unwrap_err().to_string().contains("not available"));
    }

    #[test]
    fn test_host_globals_are_absent() {
        let (result, _) = sandbox().run(r#"return [typeof require, typeof process, typeof fetch];"#, &input(vec![json!({})]));
        assert_eq!(result.unwrap(), json!(["undefined", "undefined", "undefined"]));
    }

    #[test]
    fn test_timeout_interrupts_busy_loop() {
        let sandbox = Sandbox {
            timeout: Some(Duration::from_millis(50)),
            ..sandbox()
        };
        let (result, _) = sandbox.run("while (true) {}", &input(vec![json!({})]));
        let err = result.unwrap_err();
        assert!(matches!(err, HookflowError::NodeRuntime(_)));
        assert!(err.to_string().contains("timed out"));
    }
}
