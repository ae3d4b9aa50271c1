use crate::analysis::AnalysisService;
use crate::mcp::mcp_wrap;
use crate::photo::photo_small;
use crate::query::generate_ai_image_query;
use crate::tools::*;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use uuid::Uuid;

// Minimal JSON-RPC 2.0 types
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Id {
    Str(String),
    Num(i64),
    Null,
}

#[derive(Debug, Serialize, Deserialize)]
struct Request {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Option<Id>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Response {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: Option<Id>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

fn rpc_error(id: Option<Id>, code: i64, message: &str, data: Option<Value>) -> Response {
    Response { jsonrpc: "2.0".into(), result: None, error: Some(RpcError { code, message: message.into(), data }), id }
}

fn rpc_ok(id: Option<Id>, result: Value) -> Response {
    Response { jsonrpc: "2.0".into(), result: Some(result), error: None, id }
}

fn to_value<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

pub async fn run_stdio_server(service: AnalysisService) -> anyhow::Result<()> {
    serve(&service, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Read newline-delimited requests until EOF, answering each in order.
pub async fn serve<R, W>(service: &AnalysisService, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Starting photo-ai-mcp stdio server; protocol={}", PROTOCOL_VERSION);
    let mut reader = reader;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let resp = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(service, line.trim_end()).await,
            Err(_) => {
                warn!("Dropping request line that is not valid UTF-8");
                Some(rpc_error(None, -32700, "Parse error: invalid UTF-8", None))
            }
        };
        if let Some(resp) = resp {
            let payload = serde_json::to_string(&resp)?;
            writer.write_all(payload.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }
    info!("stdin closed; shutting down");
    Ok(())
}

async fn handle_line(service: &AnalysisService, line: &str) -> Option<Response> {
    let req: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Some(rpc_error(None, -32700, &format!("Parse error: {}", e), None)),
    };
    // Requests without an id are notifications and get no reply.
    if req.id.is_none() {
        debug!("Ignoring notification {}", req.method);
        return None;
    }
    debug!("Received method={}", req.method);
    Some(dispatch(service, req).await)
}

async fn dispatch(service: &AnalysisService, req: Request) -> Response {
    match req.method.as_str() {
        "initialize" => handle_initialize(req.id),
        "tools/list" => handle_tools_list(req.id),
        "tools/call" => handle_tools_call(service, req.id, req.params).await,
        "ping" if ping_enabled() => rpc_ok(req.id, serde_json::json!({})),
        other => rpc_error(req.id, -32601, &format!("Method not found: {}", other), None),
    }
}

fn handle_initialize(id: Option<Id>) -> Response {
    rpc_ok(
        id,
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "photo-ai-mcp",
                "version": env!("CARGO_PKG_VERSION"),
            }
        }),
    )
}

fn handle_tools_list(id: Option<Id>) -> Response {
    let tools = tool_descriptors();
    rpc_ok(id, serde_json::json!({ "tools": tools }))
}

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

async fn handle_tools_call(service: &AnalysisService, id: Option<Id>, params: Value) -> Response {
    let parsed: Result<ToolCallParams, _> = serde_json::from_value(params);
    let Ok(call) = parsed else {
        return rpc_error(id, -32602, "Invalid params", None);
    };
    let call_id = Uuid::new_v4();
    debug!("tools/call {} name={}", call_id, call.name);
    match call.name.as_str() {
        "ping" if ping_enabled() => handle_ping(id, call.arguments),
        "generate_ai_image_query" => handle_generate_ai_image_query(service, id, call.arguments).await,
        "test_ai_connection" => handle_test_ai_connection(service, id).await,
        "photo_thumbnail" => handle_photo_thumbnail(id, call.arguments),
        _ => rpc_error(id, -32601, &format!("Tool not found: {}", call.name), None),
    }
}

fn handle_ping(id: Option<Id>, params: Value) -> Response {
    let input: PingInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(_) => PingInput { message: None },
    };
    let message = input.message.unwrap_or_else(|| "pong".to_string());
    rpc_ok(id, mcp_wrap(to_value(&PingOutput { message }), None, false))
}

async fn handle_generate_ai_image_query(
    service: &AnalysisService,
    id: Option<Id>,
    params: Value,
) -> Response {
    let input: GenerateAiImageQueryInput = if params.is_null() {
        GenerateAiImageQueryInput::default()
    } else {
        match serde_json::from_value(params) {
            Ok(v) => v,
            Err(e) => return rpc_error(id, -32602, &format!("Invalid params: {}", e), None),
        }
    };
    let out = generate_ai_image_query(service, input.image_base64.as_deref()).await;
    let is_error = out.is_error();
    rpc_ok(id, mcp_wrap(to_value(&out), out.error.clone(), is_error))
}

async fn handle_test_ai_connection(service: &AnalysisService, id: Option<Id>) -> Response {
    let enabled = service.generation().is_enabled();
    let out = match service.test_connection().await {
        Ok(text) => TestAiConnectionOutput { enabled, text, error: None },
        Err(e) => {
            warn!("AI connection test failed: {}", e);
            TestAiConnectionOutput {
                enabled,
                text: None,
                error: Some(ErrorShape { code: e.kind().code().to_string(), message: e.to_string() }),
            }
        }
    };
    let is_error = out.error.is_some();
    rpc_ok(id, mcp_wrap(to_value(&out), None, is_error))
}

fn handle_photo_thumbnail(id: Option<Id>, params: Value) -> Response {
    let input: PhotoThumbnailInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return rpc_error(id, -32602, &format!("Invalid params: {}", e), None),
    };
    let out = photo_small(&input.photo, input.tag.as_deref(), input.camera.as_ref(), input.selected);
    rpc_ok(id, mcp_wrap(to_value(&out), None, false))
}
