use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    HookflowError, Result,
    gateway::CredentialRecord,
    runtime::Context,
    workflow::{
        actions::{Action, ActionType},
        template,
    },
};

use super::models::*;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestAction {
    url: String,
    #[serde(default)]
    method: HttpRequestMethod,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default, alias = "query")]
    params: HashMap<String, String>,
    #[serde(default)]
    body: Option<HttpBody>,
    // http request timeout in milliseconds
    #[serde(default = "default_timeout")]
    timeout: u64,
    #[serde(default)]
    auth: AuthConfig,
    /// owner credential whose secret becomes the authorization header
    #[serde(default)]
    credential_id: Option<String>,
}

fn header_error(err: impl ToString) -> HookflowError {
    HookflowError::Action(err.to_string())
}

/// Authorization header built from a stored credential.
///
/// `apiKey` or `token` become a bearer token, unless the credential names its
/// own `header`. `username` plus `password` become basic auth.
fn credential_header(credential: &CredentialRecord) -> Result<(HeaderName, HeaderValue)> {
    let data = &credential.data;
    let text = |key: &str| data.get(key).and_then(Value::as_str);

    if let Some(secret) = text("apiKey").or_else(|| text("token")) {
        return match text("header") {
            Some(name) => Ok((name.parse().map_err(header_error)?, secret.parse().map_err(header_error)?)),
            None => Ok((HeaderName::from_static("authorization"), format!("Bearer {}", secret).parse().map_err(header_error)?)),
        };
    }
    if let (Some(user), Some(password)) = (text("username"), text("password")) {
        let encoded = STANDARD.encode(format!("{}:{}", user, password));
        return Ok((HeaderName::from_static("authorization"), format!("Basic {}", encoded).parse().map_err(header_error)?));
    }
    Err(HookflowError::Action(format!("credential '{}' has no usable secret", credential.id)))
}

impl HttpRequestAction {
    fn apply_auth_headers(
        &self,
        headers: &mut HeaderMap,
    ) -> Result<()> {
        let Some(token) = self.auth.token.as_deref() else {
            return match self.auth.auth_type {
                AuthType::None => Ok(()),
                _ => Err(HookflowError::Action("auth.token is required for authorization".to_string())),
            };
        };

        let header_name = self.auth.header.as_deref().unwrap_or("Authorization");
        let header_key: HeaderName = header_name.parse().map_err(header_error)?;
        let header_value = match self.auth.auth_type {
            AuthType::None => return Ok(()),
            AuthType::Bearer => format!("Bearer {}", token),
            AuthType::Basic => {
                let encoded = if token.contains(':') {
                    STANDARD.encode(token.as_bytes())
                } else {
                    token.to_string()
                };
                format!("Basic {}", encoded)
            }
            AuthType::Custom => token.to_string(),
        };
        headers.insert(header_key, header_value.parse().map_err(|err: InvalidHeaderValue| header_error(err))?);
        Ok(())
    }

    async fn apply_credential(
        &self,
        ctx: &Context,
        headers: &mut HeaderMap,
    ) -> Result<()> {
        let Some(credential_id) = self.credential_id.as_deref() else {
            return Ok(());
        };
        let credential = ctx.capabilities().credential(credential_id).await?.ok_or_else(|| HookflowError::Action(format!("credential '{}' not found", credential_id)))?;
        let (name, value) = credential_header(&credential)?;
        headers.insert(name, value);
        Ok(())
    }

    async fn build_request(
        &self,
        ctx: &Context,
    ) -> Result<reqwest::RequestBuilder> {
        let resolved_url = template::resolve_template(ctx, &self.url)?;

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("accept"), HeaderValue::from_static("*/*"));
        self.apply_auth_headers(&mut headers)?;
        self.apply_credential(ctx, &mut headers).await?;

        for (key, value) in &self.headers {
            let resolved_value = template::resolve_template(ctx, value)?;
            headers.insert(key.parse::<HeaderName>().map_err(header_error)?, resolved_value.parse().map_err(|err: InvalidHeaderValue| header_error(err))?);
        }

        let mut query = Vec::new();
        for (key, value) in &self.params {
            query.push((key.clone(), template::resolve_template(ctx, value)?));
        }

        let method: reqwest::Method = self.method.as_ref().parse().map_err(|_| HookflowError::Action(format!("invalid method '{:?}'", self.method)))?;
        let mut request = ctx.capabilities().http().request(method, &resolved_url).headers(headers).query(&query);

        if let Some(body) = &self.body
            && let Some(data) = &body.data
        {
            request = match body.content_type {
                ContentType::None => request,
                ContentType::Text | ContentType::Html => {
                    let text = data.as_str().ok_or(HookflowError::Action("content-type did not match the body content".to_string()))?;
                    request.body::<String>(template::resolve_template(ctx, text)?)
                }
                ContentType::Json => {
                    let resolved = template::resolve_json_value(ctx, data)?;
                    request.header(reqwest::header::CONTENT_TYPE, "application/json").body(serde_json::to_vec(&resolved)?)
                }
                ContentType::UrlEncoded | ContentType::FormData => {
                    let resolved = template::resolve_json_value(ctx, data)?;
                    let form = resolved.as_object().ok_or(HookflowError::Action("content-type did not match the body content".to_string()))?;
                    request.form(form)
                }
                ContentType::Binary => {
                    let encoded = data.as_str().ok_or(HookflowError::Action("content-type did not match the body content".to_string()))?;
                    request.body(STANDARD.decode(encoded).map_err(|err| HookflowError::Action(err.to_string()))?)
                }
            };
        }

        Ok(request.timeout(Duration::from_millis(self.timeout)))
    }
}

#[async_trait]
impl Action for HttpRequestAction {
    fn create(params: Value) -> Result<Self> {
        jsonschema::validate(&Self::schema(), &params)?;
        serde_json::from_value::<Self>(params).map_err(|e| HookflowError::NodeCompile(format!("invalid http_request node config: {}", e)))
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["url"],
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Request URL, supports template variables like {{#nodeId.key#}}"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "get", "post", "put", "patch", "delete", "head", "options"]
                },
                "headers": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "HTTP headers, values support template variables"
                },
                "params": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                },
                "query": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                },
                "body": {
                    "type": "object",
                    "properties": {
                        "contentType": {
                            "type": "string",
                            "enum": ["none", "text", "html", "json", "urlencoded", "url-encoded", "form-data", "binary"]
                        },
                        "data": {
                            "description": "Request body, templates are resolved in string values"
                        }
                    }
                },
                "timeout": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Request timeout in milliseconds"
                },
                "auth": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string", "enum": ["none", "bearer", "basic", "custom"] },
                        "token": { "type": ["string", "null"] },
                        "header": { "type": ["string", "null"] }
                    }
                },
                "credentialId": { "type": ["string", "null"] }
            }
        })
    }

    fn action_type(&self) -> ActionType {
        ActionType::HttpRequest
    }

    async fn run(
        &self,
        ctx: Arc<Context>,
    ) -> Result<Value> {
        let request = self.build_request(&ctx).await?;
        let res = request.send().await.map_err(|err| HookflowError::Action(format!("http error: {}", err)))?;

        let status = res.status().as_u16();
        let headers: HashMap<String, String> = res.headers().iter().map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string())).collect();
        let text = res.text().await.map_err(|err| HookflowError::Action(err.to_string()))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(json!({
            "statusCode": status,
            "headers": headers,
            "body": body,
        }))
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::{Value, json};

    use super::{HttpRequestAction, credential_header};
    use crate::{
        HookflowError,
        gateway::{Capabilities, CredentialRecord, Identity, StoreGateway},
        model::NodeModel,
        runtime::{Context, ExecutionContext, NodeRun},
        store::{DbStore, MemStore, Store},
        workflow::{Node, actions::Action},
    };

    fn context(identity: Option<Identity>) -> Context {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        let gateway = StoreGateway::new(Arc::new(store));
        gateway
            .put_credential(
                "u1",
                &CredentialRecord {
                    id: "c1".to_string(),
                    name: "crm".to_string(),
                    kind: "api_key".to_string(),
                    data: json!({"apiKey": "secret"}),
                },
            )
            .unwrap();
        let mut execution = ExecutionContext::new();
        execution.insert(
            "t",
            NodeRun {
                output: json!({"body": {"id": 42}}),
                logs: vec![],
                timestamp: 0,
                error: None,
            },
        );
        let node = Node::from(&NodeModel {
            id: "h".to_string(),
            node_type: "http_request".to_string(),
            ..Default::default()
        });
        let caps = Capabilities::new(identity, Arc::new(gateway), reqwest::Client::new());
        Context::new(node, Value::Null, execution, Arc::new(HashMap::from([("HOST".to_string(), "api.local".to_string())])), caps)
    }

    #[test]
    fn test_create_defaults() {
        let action = HttpRequestAction::create(json!({"url": "http://x"})).unwrap();
        assert_eq!(action.timeout, 30_000);
        assert_eq!(action.method.as_ref(), "GET");
        assert!(HttpRequestAction::create(json!({"url": "http://x", "method": "FETCH"})).is_err());
    }

    #[tokio::test]
    async fn test_build_request_resolves_templates() {
        let action = HttpRequestAction::create(json!({
            "url": "http://{{$HOST$}}/users/{{#t.body.id#}}",
            "method": "post",
            "query": {"v": "{{#t.body.id#}}"},
            "headers": {"x-trace": "abc"},
            "body": {"contentType": "json", "data": {"id": "{{#t.body.id#}}"}}
        }))
        .unwrap();
        let request = action.build_request(&context(None)).await.unwrap().build().unwrap();
        assert_eq!(request.method().as_str(), "POST");
        assert_eq!(request.url().as_str(), "http://api.local/users/42?v=42");
        assert_eq!(request.headers()["x-trace"], "abc");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(body).unwrap(), json!({"id": 42}));
    }

    #[tokio::test]
    async fn test_credential_requires_identity() {
        let action = HttpRequestAction::create(json!({"url": "http://x", "credentialId": "c1"})).unwrap();
        let err = action.build_request(&context(None)).await.err().unwrap();
        assert!(matches!(err, HookflowError::Unauthorized(_)));

        let request = action.build_request(&context(Some(Identity::new("u1")))).await.unwrap().build().unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer secret");

        let err = action.build_request(&context(Some(Identity::new("u2")))).await.err().unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_credential_header_basic() {
        let credential = CredentialRecord {
            id: "c".to_string(),
            name: "n".to_string(),
            kind: "basic".to_string(),
            data: json!({"username": "a", "password": "b"}),
        };
        let (name, value) = credential_header(&credential).unwrap();
        assert_eq!(name.as_str(), "authorization");
        assert_eq!(value, "Basic YTpi");
    }
}
