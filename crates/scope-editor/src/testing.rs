//! Scripted editor double for the test suites
//!
//! `FakeEditor` implements both host traits over an in-memory widget tree
//! that tests mutate mid-scenario: widgets die and get recreated, panels
//! fill with text, the play state flips, the debugger session comes and
//! goes. Every driving call (presses, selections, debug commands,
//! breakpoints, saves) is logged for assertions.

use std::collections::{HashMap, VecDeque};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::{io, thread};

use serde_json::{json, Value};

use scope_core::envelope::{parse_frame, Frame, Notification, Reply};
use scope_core::Image;

use crate::host::{DebugCommand, EditorHost, EditorViewport, ItemId, UiTree, WidgetId};
use crate::server::EditorServer;

#[derive(Default)]
struct FakeWidget {
    classes: Vec<String>,
    path: String,
    children: Vec<WidgetId>,
    alive: bool,
    rich: Option<String>,
    text: Option<String>,
    label: Option<String>,
    spin: Option<f64>,
    check: Option<bool>,
    button: bool,
    pressed: bool,
    signals: Vec<String>,
}

#[derive(Default)]
struct FakeItem {
    texts: Vec<String>,
    tooltips: Vec<String>,
    object_id: Option<i64>,
    children: Vec<ItemId>,
}

#[derive(Default)]
struct FakeTree {
    columns: usize,
    root: Option<ItemId>,
    items: HashMap<ItemId, FakeItem>,
    selected: Option<ItemId>,
}

#[derive(Default)]
pub struct FakeEditor {
    widgets: HashMap<WidgetId, FakeWidget>,
    trees: HashMap<WidgetId, FakeTree>,
    root: WidgetId,
    next_widget: WidgetId,
    next_item: ItemId,

    playing: bool,
    pub play_log: Vec<String>,
    pub press_counts: HashMap<WidgetId, u32>,
    pub emitted_signals: Vec<(WidgetId, String, i64)>,

    debugger_active: bool,
    debugger_paused: bool,
    debugger_debuggable: bool,
    pub debug_commands: Vec<DebugCommand>,
    pub session_breakpoints: Vec<(String, u32, bool)>,
    pub source_breakpoints: Vec<(String, u32, bool)>,
    pub source_breakpoint_error: Option<String>,

    viewport_2d: Option<Image>,
    viewport_3d: Option<Image>,
    pub saved_images: Vec<(PathBuf, u32, u32)>,
}

impl FakeEditor {
    pub fn new() -> Self {
        let mut editor = Self {
            next_widget: 1,
            next_item: 1,
            ..Self::default()
        };
        editor.root = editor.insert_widget(&["Control"], "/root/EditorNode");
        editor
    }

    fn insert_widget(&mut self, classes: &[&str], path: &str) -> WidgetId {
        let id = self.next_widget;
        self.next_widget += 1;
        self.widgets.insert(
            id,
            FakeWidget {
                classes: classes.iter().map(|c| c.to_string()).collect(),
                path: path.to_string(),
                alive: true,
                ..FakeWidget::default()
            },
        );
        id
    }

    /// Add a widget under the editor root
    pub fn add_widget(&mut self, classes: &[&str], path: &str) -> WidgetId {
        let id = self.insert_widget(classes, path);
        let root = self.root;
        self.attach(root, id);
        id
    }

    /// Move a widget under a new parent
    pub fn attach(&mut self, parent: WidgetId, child: WidgetId) {
        for widget in self.widgets.values_mut() {
            widget.children.retain(|&c| c != child);
        }
        if let Some(widget) = self.widgets.get_mut(&parent) {
            widget.children.push(child);
        }
    }

    /// Mark a widget destroyed, as the editor does when rebuilding panels
    pub fn kill_widget(&mut self, id: WidgetId) {
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.alive = false;
        }
        for widget in self.widgets.values_mut() {
            widget.children.retain(|&c| c != id);
        }
    }

    pub fn add_rich_text(&mut self, path: &str, text: &str) -> WidgetId {
        let id = self.add_widget(&["RichTextLabel"], path);
        self.set_rich_text(id, text);
        id
    }

    pub fn set_rich_text(&mut self, id: WidgetId, text: &str) {
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.rich = Some(text.to_string());
        }
    }

    pub fn add_label(&mut self, path: &str, text: &str) -> WidgetId {
        let id = self.add_widget(&["Label"], path);
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.text = Some(text.to_string());
        }
        id
    }

    pub fn add_button(&mut self, path: &str, text: &str) -> WidgetId {
        let id = self.add_widget(&["Button"], path);
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.button = true;
            widget.text = Some(text.to_string());
        }
        id
    }

    pub fn set_button_pressed(&mut self, id: WidgetId, pressed: bool) {
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.pressed = pressed;
        }
    }

    pub fn add_signal(&mut self, id: WidgetId, signal: &str) {
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.signals.push(signal.to_string());
        }
    }

    pub fn add_tree(&mut self, path: &str, columns: usize) -> WidgetId {
        self.add_tree_with_classes(&["Tree"], path, columns)
    }

    pub fn add_tree_with_classes(
        &mut self,
        classes: &[&str],
        path: &str,
        columns: usize,
    ) -> WidgetId {
        let id = self.add_widget(classes, path);
        self.trees.insert(
            id,
            FakeTree {
                columns,
                ..FakeTree::default()
            },
        );
        id
    }

    pub fn add_tree_root(&mut self, tree: WidgetId, texts: &[&str]) -> ItemId {
        let item = self.insert_item(tree, texts);
        if let Some(tree) = self.trees.get_mut(&tree) {
            tree.root = Some(item);
        }
        item
    }

    pub fn add_tree_item(&mut self, tree: WidgetId, parent: ItemId, texts: &[&str]) -> ItemId {
        let item = self.insert_item(tree, texts);
        if let Some(tree) = self.trees.get_mut(&tree) {
            if let Some(parent) = tree.items.get_mut(&parent) {
                parent.children.push(item);
            }
        }
        item
    }

    fn insert_item(&mut self, tree: WidgetId, texts: &[&str]) -> ItemId {
        let item = self.next_item;
        self.next_item += 1;
        if let Some(tree) = self.trees.get_mut(&tree) {
            tree.items.insert(
                item,
                FakeItem {
                    texts: texts.iter().map(|t| t.to_string()).collect(),
                    ..FakeItem::default()
                },
            );
        }
        item
    }

    pub fn set_item_tooltip(&mut self, tree: WidgetId, item: ItemId, column: usize, text: &str) {
        if let Some(tree) = self.trees.get_mut(&tree) {
            if let Some(item) = tree.items.get_mut(&item) {
                while item.tooltips.len() <= column {
                    item.tooltips.push(String::new());
                }
                item.tooltips[column] = text.to_string();
            }
        }
    }

    pub fn set_item_object_id(&mut self, tree: WidgetId, item: ItemId, object_id: i64) {
        if let Some(tree) = self.trees.get_mut(&tree) {
            if let Some(item) = tree.items.get_mut(&item) {
                item.object_id = Some(object_id);
            }
        }
    }

    pub fn add_property(&mut self, parent: WidgetId, class: &str, label: &str) -> WidgetId {
        let path = format!("/root/Inspector/{label}");
        let id = self.insert_widget(&[class], &path);
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.label = Some(label.to_string());
        }
        self.attach(parent, id);
        id
    }

    pub fn add_spin_slider(&mut self, parent: WidgetId, value: f64) -> WidgetId {
        let id = self.insert_widget(&["EditorSpinSlider"], "/root/Inspector/spin");
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.spin = Some(value);
        }
        self.attach(parent, id);
        id
    }

    pub fn add_line_edit(&mut self, parent: WidgetId, text: &str) -> WidgetId {
        let id = self.insert_widget(&["LineEdit"], "/root/Inspector/edit");
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.text = Some(text.to_string());
        }
        self.attach(parent, id);
        id
    }

    pub fn add_check_box(&mut self, parent: WidgetId, state: bool) -> WidgetId {
        let id = self.insert_widget(&["CheckBox"], "/root/Inspector/check");
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.check = Some(state);
        }
        self.attach(parent, id);
        id
    }

    pub fn add_button_to(&mut self, parent: WidgetId, text: &str) -> WidgetId {
        let id = self.insert_widget(&["Button"], "/root/Inspector/button");
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.button = true;
            widget.text = Some(text.to_string());
        }
        self.attach(parent, id);
        id
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn set_debugger(&mut self, active: bool, paused: bool, debuggable: bool) {
        self.debugger_active = active;
        self.debugger_paused = paused;
        self.debugger_debuggable = debuggable;
    }

    pub fn set_viewport(&mut self, viewport: EditorViewport, image: Option<Image>) {
        match viewport {
            EditorViewport::TwoD => self.viewport_2d = image,
            EditorViewport::ThreeD => self.viewport_3d = image,
        }
    }

    pub fn press_count(&self, id: WidgetId) -> u32 {
        self.press_counts.get(&id).copied().unwrap_or(0)
    }

    pub fn selected_of(&self, tree: WidgetId) -> Option<ItemId> {
        self.trees.get(&tree).and_then(|t| t.selected)
    }

    fn live(&self, id: WidgetId) -> Option<&FakeWidget> {
        self.widgets.get(&id).filter(|w| w.alive)
    }
}

impl UiTree for FakeEditor {
    fn root_widget(&self) -> Option<WidgetId> {
        self.live(self.root).map(|_| self.root)
    }

    fn is_alive(&self, id: WidgetId) -> bool {
        self.live(id).is_some()
    }

    fn widget_class(&self, id: WidgetId) -> Option<String> {
        self.live(id).and_then(|w| w.classes.first().cloned())
    }

    fn is_class(&self, id: WidgetId, class: &str) -> bool {
        self.live(id)
            .map(|w| w.classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }

    fn widget_path(&self, id: WidgetId) -> Option<String> {
        self.live(id).map(|w| w.path.clone())
    }

    fn widget_children(&self, id: WidgetId) -> Vec<WidgetId> {
        self.live(id).map(|w| w.children.clone()).unwrap_or_default()
    }

    fn rich_text(&self, id: WidgetId) -> Option<String> {
        self.live(id).and_then(|w| w.rich.clone())
    }

    fn plain_text(&self, id: WidgetId) -> Option<String> {
        self.live(id).and_then(|w| w.text.clone())
    }

    fn property_label(&self, id: WidgetId) -> Option<String> {
        self.live(id).and_then(|w| w.label.clone())
    }

    fn spin_value(&self, id: WidgetId) -> Option<f64> {
        self.live(id).and_then(|w| w.spin)
    }

    fn check_state(&self, id: WidgetId) -> Option<bool> {
        self.live(id).and_then(|w| w.check)
    }

    fn button_pressed(&self, id: WidgetId) -> Option<bool> {
        self.live(id).filter(|w| w.button).map(|w| w.pressed)
    }

    fn press_button(&mut self, id: WidgetId) -> bool {
        let is_button = self.live(id).map(|w| w.button).unwrap_or(false);
        if !is_button {
            return false;
        }
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.pressed = true;
        }
        *self.press_counts.entry(id).or_insert(0) += 1;
        true
    }

    fn tree_columns(&self, tree: WidgetId) -> usize {
        self.trees.get(&tree).map(|t| t.columns).unwrap_or(0)
    }

    fn tree_root_item(&self, tree: WidgetId) -> Option<ItemId> {
        self.trees.get(&tree).and_then(|t| t.root)
    }

    fn item_children(&self, tree: WidgetId, item: ItemId) -> Vec<ItemId> {
        self.trees
            .get(&tree)
            .and_then(|t| t.items.get(&item))
            .map(|i| i.children.clone())
            .unwrap_or_default()
    }

    fn item_text(&self, tree: WidgetId, item: ItemId, column: usize) -> String {
        self.trees
            .get(&tree)
            .and_then(|t| t.items.get(&item))
            .and_then(|i| i.texts.get(column).cloned())
            .unwrap_or_default()
    }

    fn item_tooltip(&self, tree: WidgetId, item: ItemId, column: usize) -> String {
        self.trees
            .get(&tree)
            .and_then(|t| t.items.get(&item))
            .and_then(|i| i.tooltips.get(column).cloned())
            .unwrap_or_default()
    }

    fn item_object_id(&self, tree: WidgetId, item: ItemId) -> Option<i64> {
        self.trees
            .get(&tree)
            .and_then(|t| t.items.get(&item))
            .and_then(|i| i.object_id)
    }

    fn selected_item(&self, tree: WidgetId) -> Option<ItemId> {
        self.trees.get(&tree).and_then(|t| t.selected)
    }

    fn select_item(&mut self, tree: WidgetId, item: ItemId) -> bool {
        if let Some(tree) = self.trees.get_mut(&tree) {
            if tree.items.contains_key(&item) {
                tree.selected = Some(item);
                return true;
            }
        }
        false
    }

    fn has_signal(&self, id: WidgetId, signal: &str) -> bool {
        self.live(id)
            .map(|w| w.signals.iter().any(|s| s == signal))
            .unwrap_or(false)
    }

    fn emit_selection(&mut self, tree: WidgetId, signal: &str, object_id: i64) -> bool {
        if !self.has_signal(tree, signal) {
            return false;
        }
        self.emitted_signals.push((tree, signal.to_string(), object_id));
        true
    }
}

impl EditorHost for FakeEditor {
    fn play_main_scene(&mut self) {
        self.playing = true;
        self.play_log.push("main".to_string());
    }

    fn play_custom_scene(&mut self, scene_path: &str) {
        self.playing = true;
        self.play_log.push(format!("custom:{scene_path}"));
    }

    fn play_current_scene(&mut self) {
        self.playing = true;
        self.play_log.push("current".to_string());
    }

    fn stop_playing_scene(&mut self) {
        self.playing = false;
        self.play_log.push("stop".to_string());
    }

    fn is_playing_scene(&self) -> bool {
        self.playing
    }

    fn capture_viewport(&mut self, viewport: EditorViewport) -> Option<Image> {
        match viewport {
            EditorViewport::TwoD => self.viewport_2d.clone(),
            EditorViewport::ThreeD => self.viewport_3d.clone(),
        }
    }

    fn save_png(&mut self, image: &Image, path: &Path) -> io::Result<()> {
        self.saved_images
            .push((path.to_path_buf(), image.width(), image.height()));
        Ok(())
    }

    fn debugger_active(&self) -> bool {
        self.debugger_active
    }

    fn debugger_paused(&self) -> bool {
        self.debugger_paused
    }

    fn debugger_debuggable(&self) -> bool {
        self.debugger_debuggable
    }

    fn debugger_send(&mut self, command: DebugCommand) -> bool {
        self.debug_commands.push(command);
        self.debugger_active
    }

    fn session_set_breakpoint(&mut self, path: &str, line: u32, enabled: bool) {
        self.session_breakpoints.push((path.to_string(), line, enabled));
    }

    fn set_source_breakpoint(
        &mut self,
        path: &str,
        line: u32,
        enabled: bool,
    ) -> Result<(), String> {
        if let Some(message) = &self.source_breakpoint_error {
            return Err(message.clone());
        }
        self.source_breakpoints.push((path.to_string(), line, enabled));
        Ok(())
    }
}

/// Server plus scratch directory, with the side-files redirected into it
pub struct Rig {
    pub server: EditorServer<FakeEditor>,
    pub overrides_path: PathBuf,
    pub screenshot_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl Rig {
    pub fn new(editor: FakeEditor) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut server =
            EditorServer::start(editor, &dir.path().join("editor.sock")).expect("start server");
        let overrides_path = dir.path().join("overrides.json");
        let screenshot_path = dir.path().join("editor.png");
        server.set_overrides_path(overrides_path.clone());
        server.set_editor_screenshot_path(screenshot_path.clone());
        Self {
            server,
            overrides_path,
            screenshot_path,
            _dir: dir,
        }
    }

    pub fn connect(&mut self) -> TestClient {
        let client = TestClient::connect(self.server.socket_path());
        // pick the connection up on the next frame
        self.server.tick(0.0);
        client
    }
}

/// Raw line-framed client used to stand in for an adapter
pub struct TestClient {
    stream: UnixStream,
    buffer: Vec<u8>,
    lines: VecDeque<String>,
    pub notifications: Vec<Notification>,
}

impl TestClient {
    pub fn connect(path: &Path) -> Self {
        let stream = UnixStream::connect(path).expect("connect");
        stream.set_nonblocking(true).expect("nonblocking");
        Self {
            stream,
            buffer: Vec::new(),
            lines: VecDeque::new(),
            notifications: Vec::new(),
        }
    }

    pub fn send_raw(&mut self, line: &str) {
        let mut data = line.as_bytes().to_vec();
        data.push(b'\n');
        self.stream.write_all(&data).expect("write");
    }

    pub fn send_request(&mut self, id: u64, method: &str, params: Value) {
        let mut frame = json!({"id": id, "method": method});
        if !params.is_null() {
            frame["params"] = params;
        }
        self.send_raw(&frame.to_string());
    }

    fn pump(&mut self) {
        loop {
            let mut chunk = [0u8; 4096];
            match self.stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => panic!("client read failed: {e}"),
            }
        }
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.pop();
            if !line.is_empty() {
                self.lines
                    .push_back(String::from_utf8(line).expect("utf8 line"));
            }
        }
    }

    pub fn try_reply(&mut self) -> Option<Reply> {
        self.pump();
        while let Some(line) = self.lines.pop_front() {
            match parse_frame(&line).expect("parseable frame") {
                Frame::Reply(reply) => return Some(reply),
                Frame::Notification(note) => self.notifications.push(note),
            }
        }
        None
    }

    /// Tick the server until this client sees a reply
    pub fn wait_reply(&mut self, server: &mut EditorServer<FakeEditor>) -> Reply {
        for _ in 0..50 {
            server.tick(0.016);
            if let Some(reply) = self.try_reply() {
                return reply;
            }
            thread::yield_now();
        }
        panic!("no reply within 50 ticks");
    }

    /// One request/reply round trip
    pub fn request(
        &mut self,
        server: &mut EditorServer<FakeEditor>,
        id: u64,
        method: &str,
        params: Value,
    ) -> Reply {
        self.send_request(id, method, params);
        self.wait_reply(server)
    }

    pub fn result(
        &mut self,
        server: &mut EditorServer<FakeEditor>,
        id: u64,
        method: &str,
        params: Value,
    ) -> Value {
        let reply = self.request(server, id, method, params);
        assert_eq!(reply.id, id);
        reply
            .result
            .unwrap_or_else(|| panic!("{method} returned error: {:?}", reply.error))
    }

    pub fn error(
        &mut self,
        server: &mut EditorServer<FakeEditor>,
        id: u64,
        method: &str,
        params: Value,
    ) -> (i64, String) {
        let reply = self.request(server, id, method, params);
        let error = reply
            .error
            .unwrap_or_else(|| panic!("{method} unexpectedly succeeded"));
        (error.code, error.message)
    }
}
