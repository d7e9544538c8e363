use crate::app::ports::{ToolReply, ToolTransportPort};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::Duration;

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC tool transport over HTTP. Every call opens its own session:
/// `initialize`, `notifications/initialized`, then `tools/call`.
pub struct McpHttpTransport {
    request_timeout: Option<Duration>,
}

impl McpHttpTransport {
    pub fn new(request_timeout: Option<Duration>) -> Self {
        Self { request_timeout }
    }

    fn client(&self) -> Result<reqwest::Client, String> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ToolTransportPort for McpHttpTransport {
    async fn call_tool(
        &self,
        address: &str,
        operation: &str,
        arguments: Value,
    ) -> Result<ToolReply, String> {
        let client = self.client()?;

        let init = rpc_request(
            1,
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION")}
            }),
        );
        let resp = post(&client, address, None, &init).await?;
        let session_id = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let init_reply = read_rpc_reply(resp, 1).await?;
        if let Some(err) = init_reply.get("error") {
            return Err(format!("initialize rejected: {}", rpc_error_message(err)));
        }
        tracing::debug!("Session opened with {} (session id: {:?})", address, session_id);

        let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        post(&client, address, session_id.as_deref(), &initialized).await?;

        let call = rpc_request(2, "tools/call", json!({"name": operation, "arguments": arguments}));
        let resp = post(&client, address, session_id.as_deref(), &call).await?;
        let reply = read_rpc_reply(resp, 2).await?;
        Ok(tool_reply_from_rpc(&reply))
    }
}

fn rpc_request(id: u64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

async fn post(
    client: &reqwest::Client,
    address: &str,
    session_id: Option<&str>,
    body: &Value,
) -> Result<reqwest::Response, String> {
    let mut request = client
        .post(address)
        .header(ACCEPT, "application/json, text/event-stream")
        .json(body);
    if let Some(id) = session_id {
        request = request.header(SESSION_HEADER, id);
    }
    let resp = request.send().await.map_err(|e| e.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {} from {}", status.as_u16(), address));
    }
    Ok(resp)
}

/// Read the JSON-RPC message answering `id`, from a JSON body or an SSE stream.
async fn read_rpc_reply(resp: reqwest::Response, id: u64) -> Result<Value, String> {
    let is_stream = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("text/event-stream"))
        .unwrap_or(false);
    let body = resp.text().await.map_err(|e| e.to_string())?;

    if is_stream {
        parse_sse_messages(&body)
            .into_iter()
            .find(|msg| msg.get("id").and_then(Value::as_u64) == Some(id))
            .ok_or_else(|| format!("no reply for request {} in event stream", id))
    } else {
        serde_json::from_str(&body).map_err(|e| format!("invalid JSON-RPC reply: {}", e))
    }
}

/// JSON payloads of the `data:` events in an SSE body. Multi-line data is joined.
pub fn parse_sse_messages(body: &str) -> Vec<Value> {
    let mut messages = Vec::new();
    let mut data = String::new();
    for line in body.lines().chain(std::iter::once("")) {
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        } else if line.trim().is_empty() && !data.is_empty() {
            if let Ok(value) = serde_json::from_str(&data) {
                messages.push(value);
            }
            data.clear();
        }
    }
    messages
}

/// Map a `tools/call` JSON-RPC reply onto [`ToolReply`].
pub fn tool_reply_from_rpc(reply: &Value) -> ToolReply {
    if let Some(err) = reply.get("error") {
        return ToolReply::error(rpc_error_message(err));
    }
    let result = reply.get("result").cloned().unwrap_or(Value::Null);
    let mut content: Vec<String> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();
    if content.is_empty() {
        if let Some(structured) = result.get("structuredContent").filter(|v| !v.is_null()) {
            content.push(structured.to_string());
        }
    }
    ToolReply {
        content,
        is_error: result.get("isError").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn rpc_error_message(err: &Value) -> String {
    err.get("message")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_body_yields_each_message() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\n\
                    data: \"result\":{}}\n\n";
        let messages = parse_sse_messages(body);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["id"], 2);
    }

    #[test]
    fn text_blocks_become_content() {
        let reply = json!({
            "jsonrpc": "2.0", "id": 2,
            "result": {"content": [
                {"type": "image", "data": "..."},
                {"type": "text", "text": "{\"valid\": true}"}
            ]}
        });
        let tool = tool_reply_from_rpc(&reply);
        assert_eq!(tool.content, vec!["{\"valid\": true}".to_string()]);
        assert!(!tool.is_error);
    }

    #[test]
    fn rpc_error_is_flagged() {
        let reply = json!({"jsonrpc": "2.0", "id": 2, "error": {"code": -32602, "message": "Unknown tool"}});
        assert_eq!(tool_reply_from_rpc(&reply), ToolReply::error("Unknown tool"));
    }

    #[test]
    fn structured_content_is_used_when_no_text() {
        let reply = json!({"result": {"content": [], "structuredContent": {"html": "<p/>"}}});
        let tool = tool_reply_from_rpc(&reply);
        assert_eq!(tool.first_text(), Some("{\"html\":\"<p/>\"}"));
    }

    #[test]
    fn is_error_flag_is_kept() {
        let reply = json!({"result": {"content": [{"type": "text", "text": "boom"}], "isError": true}});
        assert!(tool_reply_from_rpc(&reply).is_error);
    }
}
