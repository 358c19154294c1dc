//! Tool server exposing the remote client to MCP hosts over stdio.
//!
//! Requests and responses are newline-delimited JSON-RPC 2.0. Two tools
//! are offered: `search_students` and `get_student_detail`.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::client::{Fetched, StudentSource};
use crate::protocol::{error_codes, methods, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
use crate::schema::json_type;

pub const SERVER_NAME: &str = "pddikti-mcp-server";
pub const SERVER_VERSION: &str = "1.0.0";
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
const NOT_FOUND_TEXT: &str = "Student not found or error fetching details.";

pub mod tool_names {
    pub const SEARCH_STUDENTS: &str = "search_students";
    pub const GET_STUDENT_DETAIL: &str = "get_student_detail";
}

pub fn tool_definitions() -> Value {
    json!([
        {
            "name": tool_names::SEARCH_STUDENTS,
            "description": "Search for students in the PDDIKTI database by name, NIM, or university name.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Name, NIM, or University to search for"
                    }
                },
                "required": ["query"]
            }
        },
        {
            "name": tool_names::GET_STUDENT_DETAIL,
            "description": "Get detailed information about a specific student using their PDDIKTI ID.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "PDDIKTI Student ID"
                    }
                },
                "required": ["id"]
            }
        }
    ])
}

pub struct ToolServer<S> {
    source: S,
}

impl<S: StudentSource> ToolServer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Serve until `reader` reaches end of input.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("{SERVER_NAME} ready on stdio");

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            debug!("received: {line}");

            let Some(response) = self.handle_line(&line).await else {
                continue;
            };

            let mut encoded = serde_json::to_string(&response)?;
            encoded.push('\n');
            writer.write_all(encoded.as_bytes()).await?;
            writer.flush().await?;
        }

        info!("{SERVER_NAME} input closed, shutting down");
        Ok(())
    }

    /// Handle one raw message. Notifications yield `None`.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!("failed to parse request: {err}");
                return Some(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {err}"),
                ));
            }
        };

        // Notifications never get a reply, not even an error.
        let id = request.id?;

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                Some(id),
                error_codes::INVALID_REQUEST,
                "Invalid JSON-RPC version",
            ));
        }

        Some(self.dispatch(id, &request.method, request.params).await)
    }

    async fn dispatch(&self, id: JsonRpcId, method: &str, params: Option<Value>) -> JsonRpcResponse {
        let id = Some(id);
        match method {
            methods::INITIALIZE => {
                let protocol_version = params
                    .as_ref()
                    .and_then(|p| p.get("protocolVersion"))
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "capabilities": { "tools": {} },
                        "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION }
                    }),
                )
            }
            methods::PING => JsonRpcResponse::success(id, json!({})),
            methods::TOOLS_LIST => {
                JsonRpcResponse::success(id, json!({ "tools": tool_definitions() }))
            }
            methods::TOOLS_CALL => self.call_tool(id, params.unwrap_or(Value::Null)).await,
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        }
    }

    async fn call_tool(&self, id: Option<JsonRpcId>, params: Value) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(
                id,
                error_codes::INVALID_PARAMS,
                "Invalid arguments: name: Required",
            );
        };
        let arguments = params.get("arguments");
        debug!("calling tool {name} with {arguments:?}");

        match name {
            tool_names::SEARCH_STUDENTS => {
                let query = match required_string(arguments, "query") {
                    Ok(query) => query,
                    Err(message) => return invalid_arguments(id, message),
                };
                // A failed search is reported as an empty list, like any other caller sees it.
                let results = self.source.search(&query).await.found().unwrap_or_default();
                tool_text(id, pretty(&results), false)
            }
            tool_names::GET_STUDENT_DETAIL => {
                let student_id = match required_string(arguments, "id") {
                    Ok(student_id) => student_id,
                    Err(message) => return invalid_arguments(id, message),
                };
                match self.source.get_detail(&student_id).await {
                    Fetched::Found(detail) => tool_text(id, pretty(&detail), false),
                    Fetched::Absent(_) => tool_text(id, NOT_FOUND_TEXT.to_string(), true),
                }
            }
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown tool: {other}"),
            ),
        }
    }
}

/// Validate one required string argument, describing the failure as
/// `<field>: <constraint>`.
fn required_string(arguments: Option<&Value>, field: &str) -> Result<String, String> {
    let object = match arguments {
        None | Some(Value::Null) => return Err(format!("{field}: Required")),
        Some(Value::Object(object)) => object,
        Some(other) => {
            return Err(format!(
                "arguments: Expected object, received {}",
                json_type(other)
            ))
        }
    };

    match object.get(field) {
        None => Err(format!("{field}: Required")),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(format!(
            "{field}: Expected string, received {}",
            json_type(other)
        )),
    }
}

fn invalid_arguments(id: Option<JsonRpcId>, message: String) -> JsonRpcResponse {
    JsonRpcResponse::error(
        id,
        error_codes::INVALID_PARAMS,
        format!("Invalid arguments: {message}"),
    )
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn tool_text(id: Option<JsonRpcId>, text: String, is_error: bool) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error
        }),
    )
}
