//! Method handlers
//!
//! Every handler reads from the live widget tree through the finder, never
//! blocks, and answers in the same tick. Handlers whose data depends on a UI
//! side effect landing first (remote tree population, inspector refresh)
//! arm the side effect and answer `pending:true` with a retry hint.

use serde::Deserialize;
use serde_json::json;

use scope_core::envelope::{error_codes, Reply};
use scope_core::image::compose_side_by_side;
use scope_core::overrides::{write_overrides, Overrides};
use scope_core::Image;

use crate::finder::WidgetKey;
use crate::host::{DebugCommand, EditorHost, EditorViewport};
use crate::inspect;
use crate::launch::{AutoStop, PendingLaunch, STARTUP_CHECK_WINDOW};
use crate::router::RoutedRequest;
use crate::server::EditorServer;
use crate::stream::ClientToken;

/// Viewports at or below this edge length are placeholder-sized, not worth
/// capturing
const MIN_VIEWPORT_SIZE: u32 = 10;

impl<H: EditorHost> EditorServer<H> {
    pub(crate) fn handle(&mut self, token: ClientToken, request: &RoutedRequest) -> Reply {
        let id = request.id;
        match request.method.as_str() {
            "ping" => Reply::success(id, json!({"status": "ok"})),
            "get_status" => self.handle_get_status(id),
            "run_main_scene" => self.handle_run(token, id, "run_main_scene", &request.params),
            "run_scene" => self.handle_run(token, id, "run_scene", &request.params),
            "run_current_scene" => self.handle_run(token, id, "run_current_scene", &request.params),
            "stop_scene" => self.handle_stop_scene(id),
            "get_output" => self.handle_get_output(id, &request.params),
            "get_debugger_errors" => self.handle_get_debugger_errors(id),
            "get_debugger_stack_trace" => self.handle_get_stack_trace(id),
            "get_debugger_locals" => self.handle_get_locals(id, &request.params),
            "get_monitors" => self.handle_get_monitors(id),
            "get_remote_scene_tree" => self.handle_get_remote_scene_tree(id),
            "get_remote_node_properties" => self.handle_get_remote_node_properties(id, &request.params),
            "get_screenshot" => self.handle_get_screenshot(id, &request.params),
            "set_breakpoint" => self.handle_set_breakpoint(id, &request.params),
            "clear_breakpoints" => self.handle_clear_breakpoints(id),
            "get_debugger_state" => self.handle_get_debugger_state(id),
            "debug_continue" => self.handle_debug_send(id, DebugCommand::Continue),
            "debug_break" => self.handle_debug_send(id, DebugCommand::Break),
            "debug_step" => self.handle_debug_step(id, &request.params),
            other => Reply::failure(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        }
    }

    fn handle_get_status(&mut self, id: u64) -> Reply {
        let output_total_length = self
            .finder
            .find(&self.host, WidgetKey::OutputPanel)
            .and_then(|panel| self.host.rich_text(panel))
            .map(|text| text.chars().count())
            .unwrap_or(0);

        Reply::success(
            id,
            json!({
                "playing": self.host.is_playing_scene(),
                "output_total_length": output_total_length,
            }),
        )
    }

    fn handle_run(
        &mut self,
        token: ClientToken,
        id: u64,
        action: &'static str,
        params: &str,
    ) -> Reply {
        #[derive(Deserialize, Default)]
        struct RunParams {
            scene_path: Option<String>,
            timeout_seconds: Option<f64>,
            overrides: Option<Overrides>,
        }

        let Ok(params) = serde_json::from_str::<RunParams>(params) else {
            return Reply::failure(id, error_codes::INVALID_PARAMS, "Invalid params");
        };

        let scene_path = if action == "run_scene" {
            match params.scene_path {
                Some(path) => Some(path),
                None => {
                    return Reply::failure(
                        id,
                        error_codes::INVALID_PARAMS,
                        "Missing required param: scene_path",
                    );
                }
            }
        } else {
            None
        };

        if self.host.is_playing_scene() {
            self.host.stop_playing_scene();
        }
        self.launch_counter += 1;

        // the side-file must be on disk before the game process starts; an
        // empty set deletes any stale file instead
        if let Err(e) = write_overrides(&self.overrides_path, params.overrides.as_ref()) {
            return Reply::failure(
                id,
                error_codes::SERVER_ERROR,
                format!("Failed to write overrides: {e}"),
            );
        }

        match action {
            "run_scene" => {
                let path = scene_path.as_deref().unwrap_or_default();
                self.host.play_custom_scene(path);
            }
            "run_main_scene" => self.host.play_main_scene(),
            _ => self.host.play_current_scene(),
        }
        self.was_playing = self.host.is_playing_scene();

        let timeout = params.timeout_seconds.unwrap_or(0.0);
        self.auto_stop = (timeout > 0.0).then(|| AutoStop {
            launch_id: self.launch_counter,
            remaining: timeout,
        });

        // an auto-stop shorter than the grace window would race the check;
        // such launches keep the ack as their only reply
        self.pending_launch = if timeout <= 0.0 || timeout >= STARTUP_CHECK_WINDOW {
            Some(PendingLaunch {
                request_id: id,
                client: token,
                action,
                scene_path: scene_path.clone(),
                due_in: STARTUP_CHECK_WINDOW,
            })
        } else {
            None
        };

        let mut body = json!({"success": true, "action": action});
        if let Some(path) = &scene_path {
            body["scene_path"] = json!(path);
        }
        Reply::success(id, body)
    }

    fn handle_stop_scene(&mut self, id: u64) -> Reply {
        let was_playing = self.host.is_playing_scene();
        if was_playing {
            self.host.stop_playing_scene();
        }
        self.was_playing = false;
        self.launch_counter += 1;
        self.auto_stop = None;
        // a manual stop also withdraws the startup check; the ack already
        // sent is the launch's final reply
        self.pending_launch = None;

        Reply::success(
            id,
            json!({"success": true, "action": "stop_scene", "was_playing": was_playing}),
        )
    }

    fn handle_get_output(&mut self, id: u64, params: &str) -> Reply {
        #[derive(Deserialize, Default)]
        struct OutputParams {
            #[serde(default)]
            clear: bool,
            #[serde(default)]
            new_only: bool,
        }
        let params: OutputParams = serde_json::from_str(params).unwrap_or_default();

        let Some(panel) = self.finder.find(&self.host, WidgetKey::OutputPanel) else {
            return Reply::failure(id, error_codes::SERVER_ERROR, "Output panel not found");
        };
        let text = self.host.rich_text(panel).unwrap_or_default();
        let read = self.output.read(&text, params.new_only, params.clear);

        Reply::success(
            id,
            json!({
                "output": read.output,
                "length": read.length,
                "total_length": read.total_length,
            }),
        )
    }

    fn handle_get_debugger_errors(&mut self, id: u64) -> Reply {
        let Some(tree) = self.finder.find(&self.host, WidgetKey::ErrorsTree) else {
            return Reply::failure(id, error_codes::SERVER_ERROR, "Errors tree not found");
        };
        let errors = inspect::tree_text(&self.host, tree);
        Reply::success(
            id,
            json!({"errors": errors, "length": errors.chars().count()}),
        )
    }

    fn handle_get_stack_trace(&mut self, id: u64) -> Reply {
        let header = self.read_stack_header();
        let frames = self.read_stack_frames();
        let combined = combine_stack_trace(&header, &frames);
        Reply::success(
            id,
            json!({"stack_trace": combined, "length": combined.chars().count()}),
        )
    }

    fn handle_get_locals(&mut self, id: u64, params: &str) -> Reply {
        #[derive(Deserialize, Default)]
        struct LocalsParams {
            #[serde(default = "default_frame_index")]
            frame_index: i64,
        }
        fn default_frame_index() -> i64 {
            -1
        }
        let params: LocalsParams = serde_json::from_str(params).unwrap_or_default();

        if params.frame_index >= 0 {
            let Some(tree) = self.finder.find(&self.host, WidgetKey::StackFramesTree) else {
                return Reply::failure(
                    id,
                    error_codes::SERVER_ERROR,
                    "Stack frames not available (is debugger paused?)",
                );
            };
            let Some(root) = self.host.tree_root_item(tree) else {
                return Reply::failure(
                    id,
                    error_codes::SERVER_ERROR,
                    "Stack frames not available (is debugger paused?)",
                );
            };
            let frames = self.host.item_children(tree, root);
            let Some(&target) = frames.get(params.frame_index as usize) else {
                return Reply::failure(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!(
                        "frame_index {} out of range (have {} frames)",
                        params.frame_index,
                        frames.len()
                    ),
                );
            };

            // only arm the selection when it is not already on target, so a
            // retry with the same params never re-triggers the refresh
            if self.host.selected_item(tree) != Some(target) {
                self.host.select_item(tree, target);
                return Reply::success(
                    id,
                    json!({
                        "locals": [],
                        "count": 0,
                        "frame_index": params.frame_index,
                        "pending": true,
                        "message": "Stack frame selected, retry in ~300ms",
                    }),
                );
            }
        }

        let Some(inspector) = self.finder.find(&self.host, WidgetKey::DebuggerInspector) else {
            return Reply::failure(
                id,
                error_codes::SERVER_ERROR,
                "Debugger inspector not found (is debugger paused?)",
            );
        };
        let locals = inspect::collect_properties(&self.host, inspector);

        if params.frame_index >= 0 && locals.is_empty() {
            return Reply::success(
                id,
                json!({
                    "locals": [],
                    "count": 0,
                    "frame_index": params.frame_index,
                    "pending": true,
                    "message": "Inspector may still be loading, retry in ~300ms",
                }),
            );
        }

        Reply::success(
            id,
            json!({
                "count": locals.len(),
                "locals": locals,
                "frame_index": params.frame_index,
                "pending": false,
            }),
        )
    }

    fn handle_get_monitors(&mut self, id: u64) -> Reply {
        let Some(tree) = self.finder.find(&self.host, WidgetKey::MonitorsTree) else {
            return Reply::failure(id, error_codes::SERVER_ERROR, "Monitors tree not found");
        };

        let Some(root) = self.host.tree_root_item(tree) else {
            return Reply::success(id, json!({"monitors": [], "count": 0}));
        };

        // the tree nests groups (Time, Memory, …) over name/value rows
        let mut monitors = Vec::new();
        for group in self.host.item_children(tree, root) {
            let group_name = self.host.item_text(tree, group, 0);
            let metrics: Vec<_> = self
                .host
                .item_children(tree, group)
                .into_iter()
                .map(|metric| {
                    json!({
                        "name": self.host.item_text(tree, metric, 0),
                        "value": self.host.item_text(tree, metric, 1),
                    })
                })
                .collect();
            monitors.push(json!({"group": group_name, "metrics": metrics}));
        }

        Reply::success(id, json!({"count": monitors.len(), "monitors": monitors}))
    }

    fn handle_get_remote_scene_tree(&mut self, id: u64) -> Reply {
        let mut tree = self.finder.remote_scene_tree(&self.host);
        let mut has_content = self.remote_tree_has_content(tree);

        let mut armed = false;
        if !has_content {
            self.arm_remote_view();
            armed = true;
            // the toggle may already have been on, in which case the tree
            // exists now
            tree = self.finder.remote_scene_tree(&self.host);
            has_content = self.remote_tree_has_content(tree);
        }

        let Some(tree) = tree else {
            return Reply::failure(
                id,
                error_codes::SERVER_ERROR,
                "Remote scene tree not found (is game running?)",
            );
        };

        if !has_content {
            if armed {
                return Reply::success(
                    id,
                    json!({
                        "tree": "",
                        "length": 0,
                        "pending": true,
                        "message": "Remote view enabled, retry in ~100ms",
                    }),
                );
            }
            return Reply::failure(
                id,
                error_codes::SERVER_ERROR,
                "Remote scene tree is empty (is game running?)",
            );
        }

        let text = inspect::scene_tree_text(&self.host, tree);
        Reply::success(
            id,
            json!({
                "tree": text,
                "length": text.chars().count(),
                "pending": false,
            }),
        )
    }

    fn handle_get_remote_node_properties(&mut self, id: u64, params: &str) -> Reply {
        #[derive(Deserialize)]
        struct NodeParams {
            node_path: String,
        }
        let Ok(params) = serde_json::from_str::<NodeParams>(params) else {
            return Reply::failure(
                id,
                error_codes::INVALID_PARAMS,
                "Missing required param: node_path",
            );
        };
        let node_path = params.node_path;

        let Some(tree) = self.finder.remote_scene_tree(&self.host) else {
            return Reply::failure(
                id,
                error_codes::SERVER_ERROR,
                "Remote scene tree not found (is game running?)",
            );
        };
        self.arm_remote_view();

        if !self.remote_tree_has_content(Some(tree)) {
            return Reply::success(
                id,
                json!({
                    "node_path": node_path,
                    "properties": [],
                    "count": 0,
                    "pending": true,
                    "message": "Remote tree populating, retry in ~200ms",
                }),
            );
        }

        let Some(inspector) = self.finder.find(&self.host, WidgetKey::MainInspector) else {
            return Reply::failure(id, error_codes::SERVER_ERROR, "Main inspector not found");
        };

        let Some(target) = inspect::find_item_by_path(&self.host, tree, &node_path) else {
            return Reply::failure(
                id,
                error_codes::SERVER_ERROR,
                format!("Node not found in remote tree: {node_path}"),
            );
        };

        // a matching selection means a retry: sample the inspector instead
        // of re-arming
        if self.host.selected_item(tree) != Some(target) {
            self.host.select_item(tree, target);
            if let Some(object_id) = self.host.item_object_id(tree, target) {
                // the batch-ids signal replaced the single-id one between
                // editor versions; prefer whichever this editor declares
                if self.host.has_signal(tree, "objects_selected") {
                    self.host.emit_selection(tree, "objects_selected", object_id);
                } else if self.host.has_signal(tree, "object_selected") {
                    self.host.emit_selection(tree, "object_selected", object_id);
                }
            }
            return Reply::success(
                id,
                json!({
                    "node_path": node_path,
                    "properties": [],
                    "count": 0,
                    "pending": true,
                    "message": "Inspection triggered, retry in ~300ms",
                }),
            );
        }

        let properties = inspect::collect_properties(&self.host, inspector);
        if properties.is_empty() {
            return Reply::success(
                id,
                json!({
                    "node_path": node_path,
                    "properties": [],
                    "count": 0,
                    "pending": true,
                    "message": "Inspector may still be loading, retry in ~300ms",
                }),
            );
        }

        Reply::success(
            id,
            json!({
                "node_path": node_path,
                "count": properties.len(),
                "properties": properties,
                "pending": false,
            }),
        )
    }

    fn handle_get_screenshot(&mut self, id: u64, params: &str) -> Reply {
        #[derive(Deserialize)]
        struct ScreenshotParams {
            target: String,
        }
        let Ok(params) = serde_json::from_str::<ScreenshotParams>(params) else {
            return Reply::failure(
                id,
                error_codes::INVALID_PARAMS,
                "Missing required parameter: target",
            );
        };

        match params.target.as_str() {
            "editor" => self.capture_editor(id),
            "game" => Reply::failure(
                id,
                error_codes::INVALID_PARAMS,
                "game screenshots are served by the game helper over the datagram channel",
            ),
            other => Reply::failure(
                id,
                error_codes::INVALID_PARAMS,
                format!("Invalid target: {other} (expected: editor, game)"),
            ),
        }
    }

    fn capture_editor(&mut self, id: u64) -> Reply {
        let usable = |image: &Image| {
            image.width() > MIN_VIEWPORT_SIZE && image.height() > MIN_VIEWPORT_SIZE
        };
        let image_2d = self
            .host
            .capture_viewport(EditorViewport::TwoD)
            .filter(usable);
        let image_3d = self
            .host
            .capture_viewport(EditorViewport::ThreeD)
            .filter(usable);

        let combined = match (image_2d, image_3d) {
            (Some(left), Some(right)) => compose_side_by_side(&left, &right),
            (Some(single), None) | (None, Some(single)) => single,
            (None, None) => {
                return Reply::failure(
                    id,
                    error_codes::SERVER_ERROR,
                    "No editor viewports available (both too small or empty)",
                );
            }
        };

        let path = self.editor_screenshot_path.clone();
        if let Err(e) = self.host.save_png(&combined, &path) {
            return Reply::failure(
                id,
                error_codes::SERVER_ERROR,
                format!("Failed to save screenshot: {e}"),
            );
        }

        Reply::success(
            id,
            json!({
                "path": path.display().to_string(),
                "target": "editor",
                "width": combined.width(),
                "height": combined.height(),
            }),
        )
    }

    fn handle_set_breakpoint(&mut self, id: u64, params: &str) -> Reply {
        let Ok(params) = serde_json::from_str::<serde_json::Value>(params) else {
            return Reply::failure(id, error_codes::INVALID_PARAMS, "Invalid params");
        };

        let Some(path) = params.get("path").and_then(|v| v.as_str()) else {
            return Reply::failure(id, error_codes::INVALID_PARAMS, "Missing required param: path");
        };
        let Some(line) = params.get("line").and_then(|v| v.as_u64()) else {
            return Reply::failure(id, error_codes::INVALID_PARAMS, "Missing required param: line");
        };
        if line < 1 || line > u32::MAX as u64 {
            return Reply::failure(id, error_codes::INVALID_PARAMS, "line must be >= 1");
        }
        let line = line as u32;
        let enabled = params
            .get("enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        self.breakpoints.set(path, line, enabled);

        // the code editor widget counts lines from 0
        if let Err(message) = self.host.set_source_breakpoint(path, line - 1, enabled) {
            return Reply::failure(id, error_codes::SERVER_ERROR, message);
        }
        if self.host.debugger_active() {
            self.host.session_set_breakpoint(path, line, enabled);
        }

        Reply::success(
            id,
            json!({"success": true, "path": path, "line": line, "enabled": enabled}),
        )
    }

    fn handle_clear_breakpoints(&mut self, id: u64) -> Reply {
        for (path, line, _) in self.breakpoints.clear() {
            let _ = self.host.set_source_breakpoint(&path, line - 1, false);
            if self.host.debugger_active() {
                self.host.session_set_breakpoint(&path, line, false);
            }
        }
        Reply::success(id, json!({"success": true}))
    }

    fn handle_get_debugger_state(&mut self, id: u64) -> Reply {
        Reply::success(
            id,
            json!({
                "paused": self.host.debugger_paused(),
                "active": self.host.debugger_active(),
                "debuggable": self.host.debugger_debuggable(),
            }),
        )
    }

    fn handle_debug_send(&mut self, id: u64, command: DebugCommand) -> Reply {
        self.host.debugger_send(command);
        Reply::success(id, json!({"success": true}))
    }

    fn handle_debug_step(&mut self, id: u64, params: &str) -> Reply {
        #[derive(Deserialize, Default)]
        struct StepParams {
            mode: Option<String>,
        }
        let params: StepParams = serde_json::from_str(params).unwrap_or_default();
        let mode = params.mode.unwrap_or_else(|| "over".to_string());

        let command = match mode.as_str() {
            "into" => DebugCommand::StepInto,
            "over" => DebugCommand::StepOver,
            "out" => DebugCommand::StepOut,
            other => {
                return Reply::failure(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid mode: {other} (expected: into, over, out)"),
                );
            }
        };

        self.host.debugger_send(command);
        Reply::success(id, json!({"success": true, "mode": mode}))
    }

    pub(crate) fn read_stack_header(&mut self) -> String {
        if let Some(header) = self.finder.find(&self.host, WidgetKey::StackTraceHeader) {
            if let Some(text) = self.host.rich_text(header) {
                return text;
            }
        }
        if let Some(header) = self
            .finder
            .find(&self.host, WidgetKey::StackTraceHeaderLegacy)
        {
            if let Some(text) = self.host.plain_text(header) {
                return text;
            }
        }
        String::new()
    }

    pub(crate) fn read_stack_frames(&mut self) -> String {
        self.finder
            .find(&self.host, WidgetKey::StackFramesTree)
            .map(|tree| inspect::tree_text(&self.host, tree))
            .unwrap_or_default()
    }

    fn remote_tree_has_content(&self, tree: Option<crate::host::WidgetId>) -> bool {
        let Some(tree) = tree else {
            return false;
        };
        self.host
            .tree_root_item(tree)
            .map(|root| !self.host.item_children(tree, root).is_empty())
            .unwrap_or(false)
    }

    /// Turn the Scene dock's Remote toggle on if it is off. Pressing is
    /// skipped when already on, so repeated polls never re-arm.
    fn arm_remote_view(&mut self) {
        if let Some(toggle) = self.finder.remote_toggle(&self.host) {
            if self.host.button_pressed(toggle) != Some(true) {
                self.host.press_button(toggle);
            }
        }
    }
}

/// Header text and frames tree combined the way the stack-trace reply and
/// the startup-fault report both present them
pub(crate) fn combine_stack_trace(header: &str, frames: &str) -> String {
    match (header.is_empty(), frames.is_empty()) {
        (true, true) => String::new(),
        (false, true) => header.to_string(),
        (true, false) => frames.to_string(),
        (false, false) => format!("{header}\n\nStack frames:\n{frames}"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use scope_core::envelope::error_codes;
    use scope_core::Image;

    use crate::host::{DebugCommand, EditorHost, EditorViewport};
    use crate::testing::{FakeEditor, Rig};

    fn solid_image(width: u32, height: u32) -> Image {
        Image::from_rgba(width, height, vec![255; (width * height * 4) as usize]).unwrap()
    }

    #[test]
    fn ping_round_trip() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();
        let result = client.result(&mut rig.server, 1, "ping", Value::Null);
        assert_eq!(result["status"], "ok");
    }

    #[test]
    fn unknown_method_is_reported_with_its_name() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();
        let (code, message) = client.error(&mut rig.server, 2, "warp_ten", Value::Null);
        assert_eq!(code, error_codes::METHOD_NOT_FOUND);
        assert!(message.contains("warp_ten"));
    }

    #[test]
    fn malformed_json_gets_a_parse_error_without_killing_the_connection() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();

        client.send_raw("{this is not json");
        let reply = client.wait_reply(&mut rig.server);
        assert_eq!(reply.error.unwrap().code, error_codes::PARSE_ERROR);

        // the connection still serves requests
        let result = client.result(&mut rig.server, 3, "ping", Value::Null);
        assert_eq!(result["status"], "ok");
    }

    #[test]
    fn get_status_reports_play_state_and_output_size() {
        let mut editor = FakeEditor::new();
        editor.add_rich_text("/root/EditorNode/EditorLog/Log", "boot");
        editor.set_playing(true);
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(&mut rig.server, 1, "get_status", Value::Null);
        assert_eq!(result["playing"], true);
        assert_eq!(result["output_total_length"], 4);
    }

    #[test]
    fn output_cursor_advances_across_reads() {
        let mut editor = FakeEditor::new();
        let panel = editor.add_rich_text("/root/EditorNode/EditorLog/Log", "hello world");
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let first = client.result(
            &mut rig.server,
            1,
            "get_output",
            json!({"new_only": true, "clear": true}),
        );
        assert_eq!(first["output"], "hello world");
        assert_eq!(first["length"], 11);
        assert_eq!(first["total_length"], 11);

        rig.server
            .host_mut()
            .set_rich_text(panel, "hello world!!!!!");

        let second = client.result(
            &mut rig.server,
            2,
            "get_output",
            json!({"new_only": true, "clear": true}),
        );
        assert_eq!(second["output"], "!!!!!");
        assert_eq!(second["length"], 5);
        assert_eq!(second["total_length"], 16);
    }

    #[test]
    fn get_output_without_a_panel_is_a_server_error() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();
        let (code, _) = client.error(&mut rig.server, 1, "get_output", json!({}));
        assert_eq!(code, error_codes::SERVER_ERROR);
    }

    #[test]
    fn run_scene_acks_and_arms_everything() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();

        let result = client.result(
            &mut rig.server,
            1,
            "run_scene",
            json!({
                "scene_path": "res://a.tscn",
                "timeout_seconds": 10.0,
                "overrides": {"A": {"x": 1}},
            }),
        );
        assert_eq!(result["success"], true);
        assert_eq!(result["action"], "run_scene");
        assert_eq!(result["scene_path"], "res://a.tscn");

        assert_eq!(rig.server.host().play_log, vec!["custom:res://a.tscn"]);
        assert!(rig.server.host().is_playing_scene());
        assert_eq!(rig.server.launch_counter(), 1);
        assert!(rig.server.auto_stop.is_some());
        assert!(rig.server.pending_launch.is_some());

        let written = std::fs::read_to_string(&rig.overrides_path).unwrap();
        let parsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["A"]["x"], 1);
    }

    #[test]
    fn run_scene_requires_a_scene_path() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();
        let (code, message) = client.error(&mut rig.server, 1, "run_scene", json!({}));
        assert_eq!(code, error_codes::INVALID_PARAMS);
        assert!(message.contains("scene_path"));
    }

    #[test]
    fn run_without_overrides_removes_a_stale_side_file() {
        let mut rig = Rig::new(FakeEditor::new());
        std::fs::write(&rig.overrides_path, b"{\"Old\":{\"y\":2}}").unwrap();
        let mut client = rig.connect();

        client.result(&mut rig.server, 1, "run_main_scene", json!({}));
        assert!(!rig.overrides_path.exists());
        assert_eq!(rig.server.host().play_log, vec!["main"]);
    }

    #[test]
    fn run_stops_a_scene_that_is_already_playing() {
        let mut editor = FakeEditor::new();
        editor.set_playing(true);
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        client.result(&mut rig.server, 1, "run_current_scene", json!({}));
        assert_eq!(rig.server.host().play_log, vec!["stop", "current"]);
    }

    #[test]
    fn stop_scene_reports_whether_it_was_playing() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();

        client.result(&mut rig.server, 1, "run_main_scene", json!({}));
        let counter_after_launch = rig.server.launch_counter();

        let stopped = client.result(&mut rig.server, 2, "stop_scene", Value::Null);
        assert_eq!(stopped["was_playing"], true);
        assert!(!rig.server.host().is_playing_scene());
        assert_eq!(rig.server.launch_counter(), counter_after_launch + 1);
        assert!(rig.server.pending_launch.is_none());

        let again = client.result(&mut rig.server, 3, "stop_scene", Value::Null);
        assert_eq!(again["was_playing"], false);
    }

    #[test]
    fn short_auto_stop_window_skips_the_startup_check() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();

        client.result(
            &mut rig.server,
            1,
            "run_main_scene",
            json!({"timeout_seconds": 1.0}),
        );
        assert!(rig.server.pending_launch.is_none());
        assert!(rig.server.auto_stop.is_some());
    }

    #[test]
    fn debugger_errors_are_linearised() {
        let mut editor = FakeEditor::new();
        let tree = editor.add_tree("/root/EditorDebuggerNode/Errors/Tree", 2);
        let root = editor.add_tree_root(tree, &["Errors", ""]);
        editor.add_tree_item(tree, root, &["E 0:00:01", "null instance"]);
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(&mut rig.server, 1, "get_debugger_errors", Value::Null);
        let errors = result["errors"].as_str().unwrap();
        assert!(errors.contains("E 0:00:01 | null instance"));
        assert_eq!(result["length"], errors.chars().count());
    }

    #[test]
    fn stack_trace_combines_header_and_frames() {
        let mut editor = FakeEditor::new();
        editor.add_rich_text(
            "/root/Debugger/Stack Trace/Header",
            "Invalid access to property 'x'",
        );
        let tree = editor.add_tree("/root/Debugger/Stack Trace/Tree", 2);
        let root = editor.add_tree_root(tree, &["0 - _ready", "res://main.gd:3"]);
        let _ = root;
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(&mut rig.server, 1, "get_debugger_stack_trace", Value::Null);
        let trace = result["stack_trace"].as_str().unwrap();
        assert!(trace.starts_with("Invalid access"));
        assert!(trace.contains("Stack frames:"));
        assert!(trace.contains("_ready"));
    }

    #[test]
    fn stack_trace_falls_back_to_the_legacy_label() {
        let mut editor = FakeEditor::new();
        editor.add_label(
            "/root/Debugger/Stack Trace/@HBoxContainer/Label",
            "Breakpoint hit",
        );
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(&mut rig.server, 1, "get_debugger_stack_trace", Value::Null);
        assert_eq!(result["stack_trace"], "Breakpoint hit");
    }

    #[test]
    fn stack_trace_is_empty_when_no_panel_has_content() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();
        let result = client.result(&mut rig.server, 1, "get_debugger_stack_trace", Value::Null);
        assert_eq!(result["stack_trace"], "");
        assert_eq!(result["length"], 0);
    }

    #[test]
    fn locals_sample_the_debugger_inspector() {
        let mut editor = FakeEditor::new();
        let inspector = editor.add_widget(&["EditorDebuggerInspector"], "/root/Debugger/Inspector");
        let row = editor.add_property(inspector, "EditorPropertyInteger", "hp");
        editor.add_spin_slider(row, 42.0);
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(&mut rig.server, 1, "get_debugger_locals", json!({}));
        assert_eq!(result["count"], 1);
        assert_eq!(result["frame_index"], -1);
        assert_eq!(result["locals"][0]["name"], "hp");
        assert_eq!(result["locals"][0]["value"], "42");
    }

    #[test]
    fn selecting_a_stack_frame_is_pending_then_idempotent() {
        let mut editor = FakeEditor::new();
        let frames = editor.add_tree("/root/Debugger/Stack Trace/Tree", 2);
        let root = editor.add_tree_root(frames, &["frames", ""]);
        editor.add_tree_item(frames, root, &["0 - _ready", "res://main.gd:3"]);
        editor.add_tree_item(frames, root, &["1 - _process", "res://main.gd:9"]);
        let inspector = editor.add_widget(&["EditorDebuggerInspector"], "/root/Debugger/Inspector");
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        // first call arms the selection and returns pending
        let first = client.result(
            &mut rig.server,
            1,
            "get_debugger_locals",
            json!({"frame_index": 1}),
        );
        assert_eq!(first["pending"], true);
        let selected = rig.server.host().selected_of(frames);
        assert!(selected.is_some());

        // retry with the selection in place but the inspector still empty
        let second = client.result(
            &mut rig.server,
            2,
            "get_debugger_locals",
            json!({"frame_index": 1}),
        );
        assert_eq!(second["pending"], true);
        assert_eq!(rig.server.host().selected_of(frames), selected);

        // once the inspector populates, the data flows
        let row = rig
            .server
            .host_mut()
            .add_property(inspector, "EditorPropertyText", "name");
        rig.server.host_mut().add_line_edit(row, "world");
        let third = client.result(
            &mut rig.server,
            3,
            "get_debugger_locals",
            json!({"frame_index": 1}),
        );
        assert_eq!(third["pending"], false);
        assert_eq!(third["locals"][0]["value"], "world");
    }

    #[test]
    fn out_of_range_frame_index_is_invalid_params() {
        let mut editor = FakeEditor::new();
        let frames = editor.add_tree("/root/Debugger/Stack Trace/Tree", 2);
        editor.add_tree_root(frames, &["frames", ""]);
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let (code, _) = client.error(
            &mut rig.server,
            1,
            "get_debugger_locals",
            json!({"frame_index": 5}),
        );
        assert_eq!(code, error_codes::INVALID_PARAMS);
    }

    #[test]
    fn monitors_are_grouped() {
        let mut editor = FakeEditor::new();
        let tree = editor.add_tree("/root/EditorDebuggerNode/Monitors/Tree", 2);
        let root = editor.add_tree_root(tree, &["Monitors", ""]);
        let time = editor.add_tree_item(tree, root, &["Time", ""]);
        editor.add_tree_item(tree, time, &["FPS", "60"]);
        editor.add_tree_item(tree, time, &["Process", "2.1"]);
        let memory = editor.add_tree_item(tree, root, &["Memory", ""]);
        editor.add_tree_item(tree, memory, &["Static", "12 MiB"]);
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(&mut rig.server, 1, "get_monitors", Value::Null);
        assert_eq!(result["count"], 2);
        assert_eq!(result["monitors"][0]["group"], "Time");
        assert_eq!(result["monitors"][0]["metrics"][0]["name"], "FPS");
        assert_eq!(result["monitors"][0]["metrics"][0]["value"], "60");
        assert_eq!(result["monitors"][1]["metrics"][0]["value"], "12 MiB");
    }

    #[test]
    fn remote_tree_arms_once_and_then_serves() {
        let mut editor = FakeEditor::new();
        let toggle = editor.add_button("/root/Scene/Buttons/Remote", "Remote");
        let tree = editor.add_tree_with_classes(
            &["EditorDebuggerTree", "Tree"],
            "/root/Scene/Remote/Tree",
            1,
        );
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let first = client.result(&mut rig.server, 1, "get_remote_scene_tree", Value::Null);
        assert_eq!(first["pending"], true);
        assert_eq!(rig.server.host().press_count(toggle), 1);

        // polling again before the tree populates must not press again
        let second = client.result(&mut rig.server, 2, "get_remote_scene_tree", Value::Null);
        assert_eq!(second["pending"], true);
        assert_eq!(rig.server.host().press_count(toggle), 1);

        let host = rig.server.host_mut();
        let root = host.add_tree_root(tree, &["root"]);
        let main = host.add_tree_item(tree, root, &["Main"]);
        host.set_item_tooltip(tree, main, 0, "Main (Node2D)");

        let third = client.result(&mut rig.server, 3, "get_remote_scene_tree", Value::Null);
        assert_eq!(third["pending"], false);
        let text = third["tree"].as_str().unwrap();
        assert!(text.contains("Main (Node2D)"));
        assert_eq!(third["length"], text.chars().count());
    }

    #[test]
    fn an_already_enabled_remote_view_is_not_pressed_again() {
        let mut editor = FakeEditor::new();
        let toggle = editor.add_button("/root/Scene/Buttons/Remote", "Remote");
        editor.set_button_pressed(toggle, true);
        editor.add_tree_with_classes(
            &["EditorDebuggerTree", "Tree"],
            "/root/Scene/Remote/Tree",
            1,
        );
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let reply = client.result(&mut rig.server, 1, "get_remote_scene_tree", Value::Null);
        assert_eq!(reply["pending"], true);
        assert_eq!(rig.server.host().press_count(toggle), 0);
    }

    #[test]
    fn remote_tree_without_the_widget_is_an_error() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();
        let (code, message) = client.error(&mut rig.server, 1, "get_remote_scene_tree", Value::Null);
        assert_eq!(code, error_codes::SERVER_ERROR);
        assert!(message.contains("is game running"));
    }

    #[test]
    fn remote_node_properties_follow_the_pending_protocol() {
        let mut editor = FakeEditor::new();
        editor.add_button("/root/Scene/Buttons/Remote", "Remote");
        let tree = editor.add_tree_with_classes(
            &["EditorDebuggerTree", "Tree"],
            "/root/Scene/Remote/Tree",
            1,
        );
        editor.add_signal(tree, "objects_selected");
        let root = editor.add_tree_root(tree, &["root"]);
        let main = editor.add_tree_item(tree, root, &["Main"]);
        let player = editor.add_tree_item(tree, main, &["Player"]);
        editor.set_item_object_id(tree, player, 991);
        let inspector = editor.add_widget(
            &["EditorInspector"],
            "/root/DockSlotRightUL/Inspector/EditorInspector",
        );
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        // first call selects the node and emits the batch-ids signal
        let first = client.result(
            &mut rig.server,
            1,
            "get_remote_node_properties",
            json!({"node_path": "/root/Main/Player"}),
        );
        assert_eq!(first["pending"], true);
        assert_eq!(
            rig.server.host().emitted_signals,
            vec![(tree, "objects_selected".to_string(), 991)]
        );

        // retry: selection already matches, inspector still empty
        let second = client.result(
            &mut rig.server,
            2,
            "get_remote_node_properties",
            json!({"node_path": "/root/Main/Player"}),
        );
        assert_eq!(second["pending"], true);
        assert_eq!(rig.server.host().emitted_signals.len(), 1);

        // inspector populates; the same call returns data
        let row = rig
            .server
            .host_mut()
            .add_property(inspector, "EditorPropertyVector2", "position");
        rig.server.host_mut().add_spin_slider(row, 3.0);
        rig.server.host_mut().add_spin_slider(row, 4.5);

        let third = client.result(
            &mut rig.server,
            3,
            "get_remote_node_properties",
            json!({"node_path": "/root/Main/Player"}),
        );
        assert_eq!(third["pending"], false);
        assert_eq!(third["count"], 1);
        assert_eq!(third["properties"][0]["name"], "position");
        assert_eq!(third["properties"][0]["value"], "(3, 4.5)");
    }

    #[test]
    fn remote_node_properties_fall_back_to_the_single_id_signal() {
        let mut editor = FakeEditor::new();
        let tree = editor.add_tree_with_classes(
            &["EditorDebuggerTree", "Tree"],
            "/root/Scene/Remote/Tree",
            1,
        );
        editor.add_signal(tree, "object_selected");
        let root = editor.add_tree_root(tree, &["root"]);
        let node = editor.add_tree_item(tree, root, &["Main"]);
        editor.set_item_object_id(tree, node, 5);
        editor.add_widget(
            &["EditorInspector"],
            "/root/DockSlotRightUL/Inspector/EditorInspector",
        );
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        client.result(
            &mut rig.server,
            1,
            "get_remote_node_properties",
            json!({"node_path": "/root/Main"}),
        );
        assert_eq!(
            rig.server.host().emitted_signals,
            vec![(tree, "object_selected".to_string(), 5)]
        );
    }

    #[test]
    fn missing_remote_node_is_an_error() {
        let mut editor = FakeEditor::new();
        let tree = editor.add_tree_with_classes(
            &["EditorDebuggerTree", "Tree"],
            "/root/Scene/Remote/Tree",
            1,
        );
        let root = editor.add_tree_root(tree, &["root"]);
        editor.add_tree_item(tree, root, &["Main"]);
        editor.add_widget(
            &["EditorInspector"],
            "/root/DockSlotRightUL/Inspector/EditorInspector",
        );
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let (code, message) = client.error(
            &mut rig.server,
            1,
            "get_remote_node_properties",
            json!({"node_path": "/root/Ghost"}),
        );
        assert_eq!(code, error_codes::SERVER_ERROR);
        assert!(message.contains("/root/Ghost"));
    }

    #[test]
    fn editor_screenshot_composes_both_viewports() {
        let mut editor = FakeEditor::new();
        editor.set_viewport(EditorViewport::TwoD, Some(solid_image(64, 48)));
        editor.set_viewport(EditorViewport::ThreeD, Some(solid_image(32, 48)));
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(
            &mut rig.server,
            1,
            "get_screenshot",
            json!({"target": "editor"}),
        );
        assert_eq!(result["target"], "editor");
        assert_eq!(result["width"], 96);
        assert_eq!(result["height"], 48);
        assert_eq!(
            result["path"],
            rig.screenshot_path.display().to_string()
        );
        assert_eq!(rig.server.host().saved_images.len(), 1);
    }

    #[test]
    fn tiny_viewports_are_skipped() {
        let mut editor = FakeEditor::new();
        editor.set_viewport(EditorViewport::TwoD, Some(solid_image(8, 8)));
        editor.set_viewport(EditorViewport::ThreeD, Some(solid_image(40, 30)));
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(
            &mut rig.server,
            1,
            "get_screenshot",
            json!({"target": "editor"}),
        );
        assert_eq!(result["width"], 40);
        assert_eq!(result["height"], 30);
    }

    #[test]
    fn screenshot_with_no_usable_viewport_is_an_error() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();
        let (code, _) = client.error(
            &mut rig.server,
            1,
            "get_screenshot",
            json!({"target": "editor"}),
        );
        assert_eq!(code, error_codes::SERVER_ERROR);
    }

    #[test]
    fn screenshot_target_is_validated() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();

        let (code, _) = client.error(&mut rig.server, 1, "get_screenshot", json!({}));
        assert_eq!(code, error_codes::INVALID_PARAMS);

        let (code, _) = client.error(
            &mut rig.server,
            2,
            "get_screenshot",
            json!({"target": "window"}),
        );
        assert_eq!(code, error_codes::INVALID_PARAMS);

        // game captures never go over the stream socket
        let (code, _) = client.error(
            &mut rig.server,
            3,
            "get_screenshot",
            json!({"target": "game"}),
        );
        assert_eq!(code, error_codes::INVALID_PARAMS);
    }

    #[test]
    fn breakpoints_are_dual_written() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();

        let result = client.result(
            &mut rig.server,
            1,
            "set_breakpoint",
            json!({"path": "res://main.gd", "line": 10}),
        );
        assert_eq!(result["enabled"], true);
        // the code editor widget counts from zero
        assert_eq!(
            rig.server.host().source_breakpoints,
            vec![("res://main.gd".to_string(), 9, true)]
        );
        // no session yet, nothing pushed there
        assert!(rig.server.host().session_breakpoints.is_empty());

        // a session coming up receives the canonical set
        rig.server.host_mut().set_debugger(true, false, true);
        rig.server.tick(0.016);
        assert_eq!(
            rig.server.host().session_breakpoints,
            vec![("res://main.gd".to_string(), 10, true)]
        );

        // with the session live, new breakpoints go to both
        client.result(
            &mut rig.server,
            2,
            "set_breakpoint",
            json!({"path": "res://main.gd", "line": 20, "enabled": true}),
        );
        assert_eq!(rig.server.host().source_breakpoints.len(), 2);
        assert_eq!(rig.server.host().session_breakpoints.len(), 2);
    }

    #[test]
    fn clear_breakpoints_disarms_everything() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();

        client.result(
            &mut rig.server,
            1,
            "set_breakpoint",
            json!({"path": "res://a.gd", "line": 3}),
        );
        client.result(&mut rig.server, 2, "clear_breakpoints", Value::Null);

        let disarms: Vec<_> = rig
            .server
            .host()
            .source_breakpoints
            .iter()
            .filter(|(_, _, enabled)| !enabled)
            .collect();
        assert_eq!(disarms, vec![&("res://a.gd".to_string(), 2, false)]);
        assert!(rig.server.breakpoints.is_empty());
    }

    #[test]
    fn set_breakpoint_validates_params() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();

        let (code, message) =
            client.error(&mut rig.server, 1, "set_breakpoint", json!({"line": 3}));
        assert_eq!(code, error_codes::INVALID_PARAMS);
        assert!(message.contains("path"));

        let (code, message) = client.error(
            &mut rig.server,
            2,
            "set_breakpoint",
            json!({"path": "res://a.gd"}),
        );
        assert_eq!(code, error_codes::INVALID_PARAMS);
        assert!(message.contains("line"));

        let (code, _) = client.error(
            &mut rig.server,
            3,
            "set_breakpoint",
            json!({"path": "res://a.gd", "line": 0}),
        );
        assert_eq!(code, error_codes::INVALID_PARAMS);
    }

    #[test]
    fn source_breakpoint_failure_surfaces_as_a_server_error() {
        let mut editor = FakeEditor::new();
        editor.source_breakpoint_error = Some("could not load script".to_string());
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let (code, message) = client.error(
            &mut rig.server,
            1,
            "set_breakpoint",
            json!({"path": "res://gone.gd", "line": 1}),
        );
        assert_eq!(code, error_codes::SERVER_ERROR);
        assert!(message.contains("could not load script"));
    }

    #[test]
    fn debugger_state_reports_the_session_flags() {
        let mut editor = FakeEditor::new();
        editor.set_debugger(true, true, false);
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        let result = client.result(&mut rig.server, 1, "get_debugger_state", Value::Null);
        assert_eq!(result["active"], true);
        assert_eq!(result["paused"], true);
        assert_eq!(result["debuggable"], false);
    }

    #[test]
    fn debug_controls_forward_to_the_session() {
        let mut editor = FakeEditor::new();
        editor.set_debugger(true, true, true);
        let mut rig = Rig::new(editor);
        let mut client = rig.connect();

        client.result(&mut rig.server, 1, "debug_step", json!({"mode": "into"}));
        client.result(&mut rig.server, 2, "debug_step", json!({}));
        client.result(&mut rig.server, 3, "debug_step", json!({"mode": "out"}));
        client.result(&mut rig.server, 4, "debug_continue", Value::Null);
        client.result(&mut rig.server, 5, "debug_break", Value::Null);

        assert_eq!(
            rig.server.host().debug_commands,
            vec![
                DebugCommand::StepInto,
                DebugCommand::StepOver,
                DebugCommand::StepOut,
                DebugCommand::Continue,
                DebugCommand::Break,
            ]
        );
    }

    #[test]
    fn invalid_step_mode_is_rejected() {
        let mut rig = Rig::new(FakeEditor::new());
        let mut client = rig.connect();
        let (code, message) = client.error(
            &mut rig.server,
            1,
            "debug_step",
            json!({"mode": "sideways"}),
        );
        assert_eq!(code, error_codes::INVALID_PARAMS);
        assert!(message.contains("sideways"));
        assert!(rig.server.host().debug_commands.is_empty());
    }
}
