//! stdio transport for MCP JSON-RPC
//!
//! One request per line on stdin, one response per line on stdout. All
//! logging goes to stderr; stdout carries nothing but protocol frames.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use scope_core::{Result, ScopeError};

use crate::backend::EditorScope;
use crate::mcp::{
    InitializeParams, InitializeResult, Request, RequestId, Response, ServerCapabilities,
    ServerInfo, ToolsCapability,
};
use crate::tools::{handle_tool_call, list_tools};

pub const SERVER_NAME: &str = "scope-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2025-03-26";

/// Run the MCP server over stdin/stdout until the client disconnects
pub async fn run<B: EditorScope>(backend: Arc<B>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(stdin, stdout, backend).await
}

/// Transport-agnostic loop, also driven by the tests through in-memory pipes
pub async fn serve<B, R, W>(mut reader: R, mut writer: W, backend: Arc<B>) -> Result<()>
where
    B: EditorScope,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("MCP server ready on stdio");
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ScopeError::Transport(format!("read stdin: {e}")))?;
        if bytes_read == 0 {
            info!("client disconnected (EOF)");
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!("received: {trimmed}");

        let request: Request = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "unparseable MCP request");
                continue;
            }
        };

        // notifications (no id) get no response
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "notification");
            continue;
        };

        let response = handle_request(&request, id, backend.as_ref()).await;
        let response_json = serde_json::to_string(&response)
            .map_err(|e| ScopeError::Serialization(e.to_string()))?;
        debug!("sending: {response_json}");

        writer
            .write_all(response_json.as_bytes())
            .await
            .map_err(|e| ScopeError::Transport(format!("write stdout: {e}")))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| ScopeError::Transport(format!("write stdout: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| ScopeError::Transport(format!("flush stdout: {e}")))?;
    }
}

async fn handle_request<B: EditorScope>(request: &Request, id: RequestId, backend: &B) -> Response {
    match request.method.as_str() {
        "initialize" => handle_initialize(request, id),
        "initialized" => Response::success(id, serde_json::json!({})),
        "tools/list" => {
            Response::success(id, serde_json::json!({"tools": list_tools()}))
        }
        "tools/call" => handle_tools_call(request, id, backend).await,
        other => Response::error(id, -32601, format!("Method not found: {other}")),
    }
}

fn handle_initialize(request: &Request, id: RequestId) -> Response {
    let params: std::result::Result<InitializeParams, _> =
        serde_json::from_value(request.params.clone());
    if let Err(e) = params {
        return Response::error(id, -32602, format!("Invalid initialize params: {e}"));
    }

    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
        },
    };

    match serde_json::to_value(result) {
        Ok(value) => Response::success(id, value),
        Err(e) => Response::error(id, -32603, format!("serialize initialize result: {e}")),
    }
}

async fn handle_tools_call<B: EditorScope>(
    request: &Request,
    id: RequestId,
    backend: &B,
) -> Response {
    #[derive(serde::Deserialize)]
    struct ToolCallParams {
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    }

    let params: ToolCallParams = match serde_json::from_value(request.params.clone()) {
        Ok(params) => params,
        Err(e) => {
            return Response::error(id, -32602, format!("Invalid tool call params: {e}"));
        }
    };

    handle_tool_call(&params.name, params.arguments, id, backend).await
}
