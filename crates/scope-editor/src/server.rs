//! Frame-tick orchestration
//!
//! The embedding calls [`EditorServer::tick`] once per frame with the frame
//! delta. A tick observes play/session transitions, runs the auto-stop and
//! startup-check countdowns, tails the output panel, then drains the stream
//! transport (accept backlog, one read per client, dispatch, reply), all
//! without blocking. Handlers that need a UI side effect to land return a
//! pending result instead of waiting (the adapter retries).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use tracing::{debug, info, warn};

use scope_core::envelope::{Notification, OutputRecord, Reply};
use scope_core::paths;
use scope_core::Result;

use crate::breakpoints::BreakpointSet;
use crate::finder::{WidgetFinder, WidgetKey};
use crate::host::EditorHost;
use crate::launch::{AutoStop, PendingLaunch};
use crate::output::OutputMirror;
use crate::router;
use crate::stream::{ClientToken, StreamServer};

/// One editor server per editor process
pub struct EditorServer<H: EditorHost> {
    pub(crate) host: H,
    pub(crate) transport: StreamServer,
    pub(crate) finder: WidgetFinder,
    pub(crate) output: OutputMirror,
    pub(crate) breakpoints: BreakpointSet,
    pub(crate) auto_stop: Option<AutoStop>,
    pub(crate) pending_launch: Option<PendingLaunch>,
    pub(crate) launch_counter: u64,
    pub(crate) was_playing: bool,
    was_session_active: bool,
    pub(crate) overrides_path: PathBuf,
    pub(crate) editor_screenshot_path: PathBuf,
}

impl<H: EditorHost> EditorServer<H> {
    /// Claim the socket path and start serving. Fails when another editor
    /// already owns the socket; the file is left untouched in that case.
    pub fn start(host: H, socket_path: &Path) -> Result<Self> {
        let transport = StreamServer::start(socket_path)?;
        Ok(Self {
            host,
            transport,
            finder: WidgetFinder::new(),
            output: OutputMirror::new(),
            breakpoints: BreakpointSet::new(),
            auto_stop: None,
            pending_launch: None,
            launch_counter: 0,
            was_playing: false,
            was_session_active: false,
            overrides_path: PathBuf::from(paths::OVERRIDES_PATH),
            editor_screenshot_path: PathBuf::from(paths::EDITOR_SCREENSHOT_PATH),
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn launch_counter(&self) -> u64 {
        self.launch_counter
    }

    pub fn client_count(&self) -> usize {
        self.transport.client_count()
    }

    pub fn socket_path(&self) -> &Path {
        self.transport.socket_path()
    }

    /// Redirect the overrides side-file (used by embeddings and tests)
    pub fn set_overrides_path(&mut self, path: PathBuf) {
        self.overrides_path = path;
    }

    /// Redirect the editor screenshot file
    pub fn set_editor_screenshot_path(&mut self, path: PathBuf) {
        self.editor_screenshot_path = path;
    }

    /// One frame of work; `delta` is the frame time in seconds
    pub fn tick(&mut self, delta: f64) {
        self.observe_transitions();
        self.tick_auto_stop(delta);
        self.tick_pending_launch(delta);
        self.tick_output_mirror();

        let messages = self.transport.poll();
        for (token, line) in messages {
            let reply = self.dispatch(token, &line);
            self.transport.send(token, &reply);
        }
    }

    /// Stop serving; the socket file is unlinked only if this server bound it
    pub fn shutdown(&mut self) {
        self.transport.shutdown();
    }

    fn dispatch(&mut self, token: ClientToken, line: &str) -> String {
        let reply = match router::parse_request(line) {
            Ok(request) => {
                debug!(method = %request.method, id = request.id, "dispatching request");
                self.handle(token, &request)
            }
            Err(error_reply) => error_reply,
        };
        serde_json::to_string(&reply)
            .unwrap_or_else(|_| r#"{"id":0,"error":{"code":-32000,"message":"reply serialization failed"}}"#.to_string())
    }

    /// Track play-state and session edges between frames.
    ///
    /// A play-to-stop transition moves the launch counter so stale auto-stop
    /// timers can never fire against a newer launch; a fresh debugger
    /// session gets the canonical breakpoints re-applied (its panels are new
    /// instances, armed with nothing).
    fn observe_transitions(&mut self) {
        let playing = self.host.is_playing_scene();
        if self.was_playing && !playing {
            self.launch_counter += 1;
            debug!(launch_counter = self.launch_counter, "observed scene stop");
        }
        self.was_playing = playing;

        let session_active = self.host.debugger_active();
        if session_active && !self.was_session_active {
            for (path, line) in self.breakpoints.enabled() {
                self.host.session_set_breakpoint(&path, line, true);
            }
        }
        self.was_session_active = session_active;
    }

    fn tick_auto_stop(&mut self, delta: f64) {
        let Some(timer) = &mut self.auto_stop else {
            return;
        };
        timer.remaining -= delta;
        if timer.remaining > 0.0 {
            return;
        }

        let timer = match self.auto_stop.take() {
            Some(t) => t,
            None => return,
        };
        if timer.launch_id == self.launch_counter && self.host.is_playing_scene() {
            info!("auto-stop timeout reached, stopping scene");
            self.host.stop_playing_scene();
        }
    }

    fn tick_pending_launch(&mut self, delta: f64) {
        let Some(record) = &mut self.pending_launch else {
            return;
        };
        record.due_in -= delta;
        if record.due_in > 0.0 {
            return;
        }

        if let Some(record) = self.pending_launch.take() {
            self.run_startup_check(record);
        }
    }

    /// The one-shot startup-fault check, run once the grace window after a
    /// launch elapses. Turns an implicit crash into an explicit deferred
    /// reply on the connection that asked for the launch.
    fn run_startup_check(&mut self, record: PendingLaunch) {
        // debugger panels may be fresh instances for this play cycle
        self.finder.invalidate();

        let header = self.read_stack_header();
        let frames = self.read_stack_frames();
        let error_detected =
            header.to_lowercase().contains("error") || !frames.trim().is_empty();

        let mut stack_trace = String::new();
        if error_detected {
            warn!(action = record.action, "startup fault detected, stopping scene");
            if self.host.is_playing_scene() {
                self.host.stop_playing_scene();
            }
            stack_trace = crate::handlers::combine_stack_trace(&header, &frames);
        }

        let warnings = self
            .finder
            .find(&self.host, WidgetKey::ErrorsTree)
            .map(|tree| crate::inspect::tree_text(&self.host, tree))
            .unwrap_or_default();

        let mut body = json!({
            "success": !error_detected,
            "action": record.action,
            "error_detected": error_detected,
            "stack_trace": stack_trace,
            "warnings": warnings,
        });
        if let Some(scene_path) = &record.scene_path {
            body["scene_path"] = json!(scene_path);
        }

        let reply = Reply::success(record.request_id, body);
        if let Ok(line) = serde_json::to_string(&reply) {
            self.transport.send(record.client, &line);
        }
    }

    fn tick_output_mirror(&mut self) {
        let Some(panel) = self.finder.find(&self.host, WidgetKey::OutputPanel) else {
            return;
        };
        let Some(text) = self.host.rich_text(panel) else {
            return;
        };

        let records = self.output.tick(&text, now_secs());
        for record in records {
            self.broadcast_output(record);
        }
    }

    fn broadcast_output(&mut self, record: OutputRecord) {
        let Ok(params) = serde_json::to_value(&record) else {
            return;
        };
        let notification = Notification {
            method: OutputRecord::METHOD.to_string(),
            params,
        };
        if let Ok(line) = serde_json::to_string(&notification) {
            self.transport.broadcast(&line);
        }
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
