//! MCP tool surface
//!
//! Declares the stable tool names with their parameter schemas and renders
//! wire replies into human-readable text. Failures (editor errors, lost
//! connections, timeouts, crashed scenes) come back as tool-level error
//! results, never as protocol errors: a bad call must not tear down the MCP
//! session.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use scope_core::input::parse_input_event;
use scope_core::ScopeError;

use crate::backend::EditorScope;
use crate::mcp::{RequestId, Response};

/// Launches with an auto-stop shorter than this never produce a startup
/// report; the editor skips the check rather than racing its own timer
const STARTUP_GRACE_SECONDS: f64 = 1.5;

/// How long to wait for the deferred startup report after the ack
const STARTUP_REPORT_DEADLINE: Duration = Duration::from_secs(3);

/// Hinted delays for the single automatic pending retry
const TREE_RETRY_DELAY: Duration = Duration::from_millis(150);
const INSPECTOR_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Tool definition for tools/list
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDef {
    ToolDef {
        name: name.into(),
        description: description.into(),
        input_schema,
    }
}

fn no_params() -> Value {
    json!({"type": "object", "properties": {}})
}

fn run_properties() -> Value {
    json!({
        "timeout_seconds": {
            "type": "number",
            "description": "Stop the scene automatically after this many seconds (0 = run until stopped)"
        },
        "overrides": {
            "type": "object",
            "description": "Autoload property overrides applied at game startup: {\"AutoloadName\": {\"property\": value}}"
        }
    })
}

/// The stable tool surface
pub fn list_tools() -> Vec<ToolDef> {
    vec![
        tool(
            "ping",
            "Check that the editor is reachable and responding",
            no_params(),
        ),
        tool(
            "get_status",
            "Get editor status: whether a scene is playing and how much output has accumulated",
            no_params(),
        ),
        tool(
            "run_main_scene",
            "Run the project's main scene and report whether it survived startup",
            json!({"type": "object", "properties": run_properties()}),
        ),
        tool(
            "run_scene",
            "Run a specific scene file and report whether it survived startup",
            json!({
                "type": "object",
                "properties": {
                    "scene_path": {
                        "type": "string",
                        "description": "Path to the scene file, e.g. res://scenes/game.tscn"
                    },
                    "timeout_seconds": run_properties()["timeout_seconds"],
                    "overrides": run_properties()["overrides"],
                },
                "required": ["scene_path"]
            }),
        ),
        tool(
            "run_current_scene",
            "Run the scene currently open in the editor",
            json!({"type": "object", "properties": run_properties()}),
        ),
        tool(
            "stop_scene",
            "Stop the currently running scene",
            no_params(),
        ),
        tool(
            "get_output",
            "Read the editor Output panel (print statements, errors, warnings)",
            json!({
                "type": "object",
                "properties": {
                    "new_only": {
                        "type": "boolean",
                        "description": "Return only output appended since the last checkpoint"
                    },
                    "clear": {
                        "type": "boolean",
                        "description": "Advance the checkpoint to the current end of the panel"
                    }
                }
            }),
        ),
        tool(
            "get_debugger_errors",
            "Read the debugger's Errors tab as indented text",
            no_params(),
        ),
        tool(
            "get_debugger_stack_trace",
            "Read the debugger's stack trace (populated on runtime errors and breakpoints)",
            no_params(),
        ),
        tool(
            "get_debugger_locals",
            "Read local variables from the paused debugger, optionally selecting a stack frame first",
            json!({
                "type": "object",
                "properties": {
                    "frame_index": {
                        "type": "integer",
                        "description": "Stack frame to inspect (0 = innermost); omit to sample the current frame"
                    }
                }
            }),
        ),
        tool(
            "get_monitors",
            "Read the engine performance monitors (FPS, memory, objects, …)",
            no_params(),
        ),
        tool(
            "get_remote_scene_tree",
            "Read the live node tree of the running game",
            no_params(),
        ),
        tool(
            "get_remote_node_properties",
            "Inspect a node of the running game by path",
            json!({
                "type": "object",
                "properties": {
                    "node_path": {
                        "type": "string",
                        "description": "Node path in the running game, e.g. /root/Main/Player"
                    }
                },
                "required": ["node_path"]
            }),
        ),
        tool(
            "get_screenshot",
            "Capture a screenshot of the editor viewports or the running game",
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "What to capture",
                        "enum": ["editor", "game"]
                    }
                },
                "required": ["target"]
            }),
        ),
        tool(
            "set_breakpoint",
            "Set or clear a breakpoint at a script line",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Script path, e.g. res://player.gd"
                    },
                    "line": {
                        "type": "integer",
                        "description": "1-indexed line number"
                    },
                    "enabled": {
                        "type": "boolean",
                        "description": "false removes the breakpoint",
                        "default": true
                    }
                },
                "required": ["path", "line"]
            }),
        ),
        tool(
            "clear_breakpoints",
            "Remove every breakpoint",
            no_params(),
        ),
        tool(
            "get_debugger_state",
            "Report whether a debugger session is active, paused and debuggable",
            no_params(),
        ),
        tool(
            "debug_continue",
            "Resume execution from a paused debugger",
            no_params(),
        ),
        tool(
            "debug_step",
            "Step the paused debugger",
            json!({
                "type": "object",
                "properties": {
                    "mode": {
                        "type": "string",
                        "description": "How to step",
                        "enum": ["into", "over", "out"],
                        "default": "over"
                    }
                }
            }),
        ),
        tool(
            "debug_break",
            "Pause the running game at the next opportunity",
            no_params(),
        ),
        tool(
            "evaluate_expression",
            "Evaluate an expression inside the running game",
            json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Expression evaluated in the game's scripting context"
                    }
                },
                "required": ["expression"]
            }),
        ),
        tool(
            "send_input",
            "Send a synthetic input event to the running game",
            json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "description": "Kind of input event",
                        "enum": ["action", "key", "mouse_button", "mouse_motion"]
                    },
                    "action": {"type": "string", "description": "Action name (type = action)"},
                    "key": {"type": "string", "description": "Key name, e.g. \"a\", \"space\", \"f5\" (type = key)"},
                    "button": {
                        "type": "string",
                        "description": "Mouse button name (type = mouse_button)",
                        "enum": ["left", "right", "middle", "wheel_up", "wheel_down"]
                    },
                    "pressed": {"type": "boolean", "default": true},
                    "x": {"type": "number"},
                    "y": {"type": "number"},
                    "relative_x": {"type": "number"},
                    "relative_y": {"type": "number"}
                },
                "required": ["type"]
            }),
        ),
    ]
}

/// Serve one tools/call request
pub async fn handle_tool_call<B: EditorScope>(
    name: &str,
    args: Value,
    id: RequestId,
    backend: &B,
) -> Response {
    match dispatch(name, args, backend).await {
        Ok(text) => Response::success(
            id,
            json!({"content": [{"type": "text", "text": text}]}),
        ),
        Err(text) => Response::success(
            id,
            json!({"content": [{"type": "text", "text": text}], "isError": true}),
        ),
    }
}

type ToolOutcome = std::result::Result<String, String>;

async fn dispatch<B: EditorScope>(name: &str, args: Value, backend: &B) -> ToolOutcome {
    if !backend.is_connected() {
        return Err("Not connected to the editor".to_string());
    }

    match name {
        "ping" => {
            let reply = call(backend, "ping", None).await?;
            let status = reply["status"].as_str().unwrap_or("unknown");
            Ok(format!("Editor is responding (status: {status})"))
        }
        "get_status" => {
            let reply = call(backend, "get_status", None).await?;
            let playing = if reply["playing"].as_bool().unwrap_or(false) {
                "running"
            } else {
                "not running"
            };
            Ok(format!(
                "Scene: {playing}\nOutput length: {} characters",
                reply["output_total_length"].as_u64().unwrap_or(0)
            ))
        }
        "run_main_scene" | "run_scene" | "run_current_scene" => {
            run_scene_outcome(backend, name, &args).await
        }
        "stop_scene" => {
            let reply = call(backend, "stop_scene", None).await?;
            if reply["was_playing"].as_bool().unwrap_or(false) {
                Ok("Scene stopped".to_string())
            } else {
                Ok("No scene was playing".to_string())
            }
        }
        "get_output" => {
            let params = json!({
                "new_only": args.get("new_only").and_then(Value::as_bool).unwrap_or(false),
                "clear": args.get("clear").and_then(Value::as_bool).unwrap_or(false),
            });
            let reply = call(backend, "get_output", Some(params)).await?;
            let output = reply["output"].as_str().unwrap_or("");
            if output.is_empty() {
                Ok("No output captured".to_string())
            } else {
                Ok(output.to_string())
            }
        }
        "get_debugger_errors" => {
            let reply = call(backend, "get_debugger_errors", None).await?;
            let errors = reply["errors"].as_str().unwrap_or("");
            if errors.trim().is_empty() {
                Ok("No errors reported".to_string())
            } else {
                Ok(errors.to_string())
            }
        }
        "get_debugger_stack_trace" => {
            let reply = call(backend, "get_debugger_stack_trace", None).await?;
            let trace = reply["stack_trace"].as_str().unwrap_or("");
            if trace.trim().is_empty() {
                Ok("No stack trace available".to_string())
            } else {
                Ok(trace.to_string())
            }
        }
        "get_debugger_locals" => {
            let frame_index = args
                .get("frame_index")
                .and_then(Value::as_i64)
                .unwrap_or(-1);
            let params = json!({"frame_index": frame_index});
            let reply = request_with_pending_retry(
                backend,
                "get_debugger_locals",
                params,
                INSPECTOR_RETRY_DELAY,
            )
            .await?;
            if is_pending(&reply) {
                return Ok("Locals are not populated yet, try again shortly".to_string());
            }
            let Some(locals) = reply["locals"].as_array() else {
                return Ok("No locals captured (is the debugger paused?)".to_string());
            };
            if locals.is_empty() {
                return Ok("No locals captured (is the debugger paused?)".to_string());
            }
            Ok(render_variables(locals))
        }
        "get_monitors" => {
            let reply = call(backend, "get_monitors", None).await?;
            let Some(groups) = reply["monitors"].as_array() else {
                return Ok("No monitors available".to_string());
            };
            let mut text = String::new();
            for group in groups {
                text.push_str(group["group"].as_str().unwrap_or("?"));
                text.push_str(":\n");
                for metric in group["metrics"].as_array().unwrap_or(&Vec::new()) {
                    text.push_str(&format!(
                        "  {}: {}\n",
                        metric["name"].as_str().unwrap_or("?"),
                        metric["value"].as_str().unwrap_or("")
                    ));
                }
            }
            if text.is_empty() {
                Ok("No monitors available".to_string())
            } else {
                Ok(text)
            }
        }
        "get_remote_scene_tree" => {
            let reply = request_with_pending_retry(
                backend,
                "get_remote_scene_tree",
                json!({}),
                TREE_RETRY_DELAY,
            )
            .await?;
            if is_pending(&reply) {
                return Ok("Remote scene tree is still populating, try again shortly".to_string());
            }
            Ok(reply["tree"].as_str().unwrap_or("").to_string())
        }
        "get_remote_node_properties" => {
            let Some(node_path) = args.get("node_path").and_then(Value::as_str) else {
                return Err("Missing required parameter: node_path".to_string());
            };
            let params = json!({"node_path": node_path});
            let reply = request_with_pending_retry(
                backend,
                "get_remote_node_properties",
                params,
                INSPECTOR_RETRY_DELAY,
            )
            .await?;
            if is_pending(&reply) {
                return Ok(format!(
                    "Inspector for {node_path} is not populated yet, try again shortly"
                ));
            }
            let Some(properties) = reply["properties"].as_array() else {
                return Ok(format!("No properties found for {node_path}"));
            };
            if properties.is_empty() {
                return Ok(format!("No properties found for {node_path}"));
            }
            Ok(format!(
                "Properties of {node_path}:\n{}",
                render_variables(properties)
            ))
        }
        "get_screenshot" => {
            let target = args.get("target").and_then(Value::as_str).unwrap_or("");
            let reply = match target {
                "editor" => call(backend, "get_screenshot", Some(json!({"target": "editor"}))).await?,
                "game" => backend
                    .game_screenshot()
                    .await
                    .map_err(render_game_error)?,
                _ => {
                    return Err(
                        "Invalid or missing target (expected: editor, game)".to_string(),
                    );
                }
            };
            Ok(format!(
                "Saved {target} screenshot to {} ({}x{})",
                reply["path"].as_str().unwrap_or("?"),
                reply["width"].as_u64().unwrap_or(0),
                reply["height"].as_u64().unwrap_or(0)
            ))
        }
        "set_breakpoint" => {
            let Some(path) = args.get("path").and_then(Value::as_str) else {
                return Err("Missing required parameter: path".to_string());
            };
            let Some(line) = args.get("line").and_then(Value::as_u64) else {
                return Err("Missing required parameter: line".to_string());
            };
            let enabled = args
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let params = json!({"path": path, "line": line, "enabled": enabled});
            call(backend, "set_breakpoint", Some(params)).await?;
            if enabled {
                Ok(format!("Breakpoint set at {path}:{line}"))
            } else {
                Ok(format!("Breakpoint removed at {path}:{line}"))
            }
        }
        "clear_breakpoints" => {
            call(backend, "clear_breakpoints", None).await?;
            Ok("All breakpoints cleared".to_string())
        }
        "get_debugger_state" => {
            let reply = call(backend, "get_debugger_state", None).await?;
            Ok(format!(
                "active: {}, paused: {}, debuggable: {}",
                reply["active"].as_bool().unwrap_or(false),
                reply["paused"].as_bool().unwrap_or(false),
                reply["debuggable"].as_bool().unwrap_or(false)
            ))
        }
        "debug_continue" => {
            call(backend, "debug_continue", None).await?;
            Ok("Continued execution".to_string())
        }
        "debug_break" => {
            call(backend, "debug_break", None).await?;
            Ok("Break requested".to_string())
        }
        "debug_step" => {
            let mode = args
                .get("mode")
                .and_then(Value::as_str)
                .unwrap_or("over");
            if !matches!(mode, "into" | "over" | "out") {
                return Err(format!("Invalid mode: {mode} (expected: into, over, out)"));
            }
            call(backend, "debug_step", Some(json!({"mode": mode}))).await?;
            Ok(format!("Stepped {mode}"))
        }
        "evaluate_expression" => {
            let Some(expression) = args.get("expression").and_then(Value::as_str) else {
                return Err("Missing required parameter: expression".to_string());
            };
            let reply = backend
                .game_evaluate(expression)
                .await
                .map_err(render_game_error)?;
            Ok(reply["result"].as_str().unwrap_or("").to_string())
        }
        "send_input" => {
            let event = parse_input_event(&args).map_err(|e| e.to_string())?;
            backend.game_input(event).await.map_err(render_game_error)?;
            Ok("Input delivered".to_string())
        }
        other => Err(format!("Unknown tool: {other}")),
    }
}

/// Run a scene, then wait for the deferred startup report and fold it into
/// the outcome the caller sees. A crash comes back as a tool-level error
/// carrying the stack trace, interleaved with the fresh output tail.
async fn run_scene_outcome<B: EditorScope>(
    backend: &B,
    action: &str,
    args: &Value,
) -> ToolOutcome {
    let mut params = json!({});
    if action == "run_scene" {
        let Some(scene_path) = args.get("scene_path").and_then(Value::as_str) else {
            return Err("Missing required parameter: scene_path".to_string());
        };
        params["scene_path"] = json!(scene_path);
    }
    let timeout_seconds = args
        .get("timeout_seconds")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    if timeout_seconds > 0.0 {
        params["timeout_seconds"] = json!(timeout_seconds);
    }
    if let Some(overrides) = args.get("overrides") {
        if overrides.is_object() {
            params["overrides"] = overrides.clone();
        }
    }

    let (request_id, ack) = backend
        .request_tracked(action, Some(params))
        .await
        .map_err(|e| e.to_string())?;

    let started = match ack.get("scene_path").and_then(Value::as_str) {
        Some(path) => format!("Scene started: {path}"),
        None => "Scene started".to_string(),
    };

    // runs shorter than the grace window never get a startup report
    if timeout_seconds > 0.0 && timeout_seconds < STARTUP_GRACE_SECONDS {
        return Ok(format!("{started} (run too short for a startup check)"));
    }

    let report = match backend.wait_followup(request_id, STARTUP_REPORT_DEADLINE).await {
        Ok(report) => report,
        Err(ScopeError::Timeout) => {
            return Ok(format!("{started} (no startup report received)"));
        }
        Err(e) => return Err(e.to_string()),
    };

    let warnings = report["warnings"].as_str().unwrap_or("").trim().to_string();
    if report["error_detected"].as_bool().unwrap_or(false) {
        let trace = report["stack_trace"].as_str().unwrap_or("");
        let mut text = format!("Scene crashed during startup.\n\nStack trace:\n{trace}");
        if let Ok(out) = backend
            .request("get_output", Some(json!({"new_only": true, "clear": true})))
            .await
        {
            if let Some(tail) = out["output"].as_str() {
                if !tail.trim().is_empty() {
                    text.push_str(&format!("\n\nOutput:\n{tail}"));
                }
            }
        }
        if !warnings.is_empty() {
            text.push_str(&format!("\n\nWarnings:\n{warnings}"));
        }
        return Err(text);
    }

    let mut text = format!("{started} and survived the startup window");
    if !warnings.is_empty() {
        text.push_str(&format!("\n\nWarnings:\n{warnings}"));
    }
    Ok(text)
}

async fn call<B: EditorScope>(
    backend: &B,
    method: &str,
    params: Option<Value>,
) -> std::result::Result<Value, String> {
    backend
        .request(method, params)
        .await
        .map_err(|e| e.to_string())
}

/// Perform the single automatic retry the pending protocol allows: if the
/// first reply is pending, wait the hinted delay and ask once more. A second
/// pending is surfaced to the caller as "not populated yet".
async fn request_with_pending_retry<B: EditorScope>(
    backend: &B,
    method: &str,
    params: Value,
    delay: Duration,
) -> std::result::Result<Value, String> {
    let first = backend
        .request(method, Some(params.clone()))
        .await
        .map_err(|e| e.to_string())?;
    if !is_pending(&first) {
        return Ok(first);
    }

    sleep(delay).await;
    backend
        .request(method, Some(params))
        .await
        .map_err(|e| e.to_string())
}

fn is_pending(value: &Value) -> bool {
    value["pending"].as_bool().unwrap_or(false)
}

fn render_variables(entries: &[Value]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&format!(
            "{} = {} ({})\n",
            entry["name"].as_str().unwrap_or("?"),
            entry["value"].as_str().unwrap_or(""),
            entry["type"].as_str().unwrap_or("unknown")
        ));
    }
    text
}

fn render_game_error(error: ScopeError) -> String {
    match error {
        ScopeError::Timeout => {
            "No reply from the game helper (is a scene running with the helper autoload?)"
                .to_string()
        }
        other => other.to_string(),
    }
}
