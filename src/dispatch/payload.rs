//! Normalization of inbound trigger requests.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    Form,
    extract::{FromRequest, Multipart},
    http::{HeaderMap, Method, Request, header},
};
use serde_json::{Map, Value, json};

use crate::{HookflowError, Result, registry::TriggerKind, utils};

use super::upload::UploadedFile;

/// Raw trigger request as received by the server.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub method: Method,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Inbound {
    fn content_type(&self) -> &str {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("")
    }

    fn json_body(&self) -> Result<Value> {
        if self.body.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_slice(&self.body).map_err(|e| HookflowError::BadRequest(format!("invalid JSON body: {}", e)))
    }
}

/// Payload handed to the entry node plus the files still to be stored.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub payload: Value,
    pub files: Vec<UploadedFile>,
}

pub async fn normalize(
    kind: TriggerKind,
    trigger_id: &str,
    inbound: Inbound,
) -> Result<Normalized> {
    let now = utils::time::time_millis();
    match kind {
        TriggerKind::Webhook => Ok(Normalized {
            payload: webhook_payload(trigger_id, &inbound, now),
            files: Vec::new(),
        }),
        TriggerKind::Chat => Ok(Normalized {
            payload: chat_payload(trigger_id, &inbound, now)?,
            files: Vec::new(),
        }),
        TriggerKind::Form => form_payload(trigger_id, inbound, now).await,
    }
}

fn headers_json(headers: &HeaderMap) -> Value {
    let map = headers.iter().filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), Value::String(v.to_string())))).collect::<Map<_, _>>();
    Value::Object(map)
}

/// `{body, query, headers, method, triggerId, receivedAt}`, a body that is
/// not JSON is kept as text.
fn webhook_payload(
    trigger_id: &str,
    inbound: &Inbound,
    now: i64,
) -> Value {
    let body = if inbound.body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&inbound.body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&inbound.body).into_owned()))
    };
    json!({
        "body": body,
        "query": inbound.query,
        "headers": headers_json(&inbound.headers),
        "method": inbound.method.as_str(),
        "triggerId": trigger_id,
        "receivedAt": utils::time::to_rfc3339(now),
    })
}

/// `{message, sessionId, userId, metadata, triggerId, receivedAt}`.
fn chat_payload(
    trigger_id: &str,
    inbound: &Inbound,
    now: i64,
) -> Result<Value> {
    let body = inbound.json_body()?;
    let message = match body.get("message").or_else(|| body.get("chatInput")) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err(HookflowError::BadRequest("message is required".to_string())),
    };
    let session_id = body.get("sessionId").and_then(Value::as_str).map(str::to_string).unwrap_or_else(utils::longid);
    Ok(json!({
        "message": message,
        "sessionId": session_id,
        "userId": body.get("userId").cloned().unwrap_or(Value::Null),
        "metadata": body.get("metadata").cloned().unwrap_or_else(|| json!({})),
        "triggerId": trigger_id,
        "receivedAt": utils::time::to_rfc3339(now),
    }))
}

/// `{fields, files, triggerId, submittedAt}`. Files are described by name,
/// size and type until they are stored.
async fn form_payload(
    trigger_id: &str,
    inbound: Inbound,
    now: i64,
) -> Result<Normalized> {
    let content_type = inbound.content_type().to_ascii_lowercase();
    let (fields, files) = if content_type.starts_with("multipart/form-data") {
        read_multipart(inbound).await?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(pairs) = Form::<HashMap<String, String>>::from_request(into_request(inbound)?, &()).await.map_err(|e| HookflowError::BadRequest(e.body_text()))?;
        (pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect(), Vec::new())
    } else {
        let body = inbound.json_body()?;
        let fields = match body.get("fields") {
            Some(Value::Object(fields)) => fields.clone(),
            _ => match body {
                Value::Object(map) => map,
                _ => return Err(HookflowError::BadRequest("form body must be a JSON object".to_string())),
            },
        };
        (fields, Vec::new())
    };

    let described = files.iter().map(|f| (f.field.clone(), json!({"name": f.name, "size": f.data.len(), "mimeType": f.mime_type}))).collect::<Map<_, _>>();
    Ok(Normalized {
        payload: json!({
            "fields": fields,
            "files": described,
            "triggerId": trigger_id,
            "submittedAt": utils::time::to_rfc3339(now),
        }),
        files,
    })
}

/// Rebuilds a request so the body extractors of axum can read it.
fn into_request(inbound: Inbound) -> Result<Request<Body>> {
    let mut request = Request::builder().method(inbound.method);
    if let Some(ct) = inbound.headers.get(header::CONTENT_TYPE) {
        request = request.header(header::CONTENT_TYPE, ct);
    }
    request.body(Body::from(inbound.body)).map_err(|e| HookflowError::BadRequest(e.to_string()))
}

async fn read_multipart(inbound: Inbound) -> Result<(Map<String, Value>, Vec<UploadedFile>)> {
    let mut multipart = Multipart::from_request(into_request(inbound)?, &()).await.map_err(|e| HookflowError::BadRequest(e.body_text()))?;

    let mut fields = Map::new();
    let mut files = Vec::new();
    while let Some(part) = multipart.next_field().await.map_err(|e| HookflowError::BadRequest(e.body_text()))? {
        let name = part.name().unwrap_or_default().to_string();
        match part.file_name().map(str::to_string) {
            Some(file_name) => {
                let mime_type = part.content_type().unwrap_or("application/octet-stream").to_string();
                let data = part.bytes().await.map_err(|e| HookflowError::BadRequest(e.body_text()))?;
                files.push(UploadedFile {
                    field: name,
                    name: file_name,
                    mime_type,
                    data,
                });
            }
            None => {
                let text = part.text().await.map_err(|e| HookflowError::BadRequest(e.body_text()))?;
                fields.insert(name, Value::String(text));
            }
        }
    }
    Ok((fields, files))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use axum::{
        body::Bytes,
        http::{HeaderMap, HeaderValue, Method, header},
    };
    use serde_json::json;

    use super::{Inbound, normalize};
    use crate::registry::TriggerKind;

    fn inbound(
        content_type: &str,
        body: &'static [u8],
    ) -> Inbound {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        Inbound {
            method: Method::POST,
            query: HashMap::from([("src".to_string(), "crm".to_string())]),
            headers,
            body: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn test_webhook_payload() {
        let n = normalize(TriggerKind::Webhook, "wh1", inbound("application/json", br#"{"a":1}"#)).await.unwrap();
        assert_eq!(n.payload["body"], json!({"a": 1}));
        assert_eq!(n.payload["query"], json!({"src": "crm"}));
        assert_eq!(n.payload["method"], json!("POST"));
        assert_eq!(n.payload["headers"]["content-type"], json!("application/json"));
        assert_eq!(n.payload["triggerId"], json!("wh1"));

        let n = normalize(TriggerKind::Webhook, "wh1", inbound("text/plain", b"ping")).await.unwrap();
        assert_eq!(n.payload["body"], json!("ping"));
    }

    #[tokio::test]
    async fn test_chat_payload() {
        let n = normalize(TriggerKind::Chat, "c1", inbound("application/json", br#"{"message":"hi","sessionId":"s1"}"#)).await.unwrap();
        assert_eq!(n.payload["message"], json!("hi"));
        assert_eq!(n.payload["sessionId"], json!("s1"));
        assert_eq!(n.payload["userId"], json!(null));
        assert_eq!(n.payload["metadata"], json!({}));

        assert!(normalize(TriggerKind::Chat, "c1", inbound("application/json", br#"{"sessionId":"s1"}"#)).await.is_err());
    }

    #[tokio::test]
    async fn test_form_json_and_urlencoded() {
        let n = normalize(TriggerKind::Form, "f1", inbound("application/json", br#"{"email":"a@b.c"}"#)).await.unwrap();
        assert_eq!(n.payload["fields"], json!({"email": "a@b.c"}));
        assert_eq!(n.payload["files"], json!({}));

        let n = normalize(TriggerKind::Form, "f1", inbound("application/x-www-form-urlencoded", b"email=a%40b.c&name=Ann")).await.unwrap();
        assert_eq!(n.payload["fields"], json!({"email": "a@b.c", "name": "Ann"}));
    }

    #[tokio::test]
    async fn test_form_multipart() {
        let body: &'static [u8] = b"--XyZ\r\nContent-Disposition: form-data; name=\"email\"\r\n\r\na@b.c\r\n--XyZ\r\nContent-Disposition: form-data; name=\"cv\"; filename=\"cv.txt\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XyZ--\r\n";
        let n = normalize(TriggerKind::Form, "f1", inbound("multipart/form-data; boundary=XyZ", body)).await.unwrap();
        assert_eq!(n.payload["fields"], json!({"email": "a@b.c"}));
        assert_eq!(n.payload["files"]["cv"], json!({"name": "cv.txt", "size": 5, "mimeType": "text/plain"}));
        assert_eq!(n.files.len(), 1);
        assert_eq!(&n.files[0].data[..], b"hello");
    }
}
