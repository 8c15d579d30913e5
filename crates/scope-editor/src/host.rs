//! Trait seams to the live editor
//!
//! The editor exposes no stable API for its internal widgets, so handlers
//! reach it through these traits. `UiTree` is the reflection surface over
//! the live widget tree; `EditorHost` adds scene control, viewport capture
//! and the debugger session. Widget and item handles are opaque ids owned by
//! the editor, and a handle can die at any time (panels are recreated across
//! play cycles), so every cached handle must be re-validated with
//! [`UiTree::is_alive`] before use.

use std::io;
use std::path::Path;

use scope_core::Image;

/// Opaque handle to a live widget
pub type WidgetId = u64;

/// Opaque handle to a row of a tree widget
pub type ItemId = u64;

/// The two capturable editor viewports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorViewport {
    TwoD,
    ThreeD,
}

/// Control messages accepted by a debugger session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    /// Step into the next call
    StepInto,
    /// Step over the current line
    StepOver,
    /// Step out of the current frame
    StepOut,
    Continue,
    Break,
}

/// Reflection over the editor's live widget tree
pub trait UiTree {
    /// The editor's base control, root of every search
    fn root_widget(&self) -> Option<WidgetId>;

    /// Whether the underlying object still exists
    fn is_alive(&self, id: WidgetId) -> bool;

    /// Runtime class name, `None` for dead handles
    fn widget_class(&self, id: WidgetId) -> Option<String>;

    /// Inheritance-aware class check
    fn is_class(&self, id: WidgetId, class: &str) -> bool;

    /// Absolute path of the widget inside the tree
    fn widget_path(&self, id: WidgetId) -> Option<String>;

    fn widget_children(&self, id: WidgetId) -> Vec<WidgetId>;

    /// Parsed text of a rich-text widget, without markup
    fn rich_text(&self, id: WidgetId) -> Option<String>;

    /// Text of a plain label, button or line-edit
    fn plain_text(&self, id: WidgetId) -> Option<String>;

    /// Row label of an inspector property widget
    fn property_label(&self, id: WidgetId) -> Option<String>;

    /// Current value of a numeric spin slider
    fn spin_value(&self, id: WidgetId) -> Option<f64>;

    /// Current state of a check box
    fn check_state(&self, id: WidgetId) -> Option<bool>;

    /// Toggle state of a button, `None` when not a button
    fn button_pressed(&self, id: WidgetId) -> Option<bool>;

    /// Press a button as a user would; returns false for non-buttons
    fn press_button(&mut self, id: WidgetId) -> bool;

    fn tree_columns(&self, tree: WidgetId) -> usize;

    fn tree_root_item(&self, tree: WidgetId) -> Option<ItemId>;

    fn item_children(&self, tree: WidgetId, item: ItemId) -> Vec<ItemId>;

    fn item_text(&self, tree: WidgetId, item: ItemId, column: usize) -> String;

    fn item_tooltip(&self, tree: WidgetId, item: ItemId, column: usize) -> String;

    /// Remote object id stored in the item's metadata, when present
    fn item_object_id(&self, tree: WidgetId, item: ItemId) -> Option<i64>;

    fn selected_item(&self, tree: WidgetId) -> Option<ItemId>;

    /// Select a row as a user click would, firing the widget's own selection
    /// signals; returns false when the item is gone
    fn select_item(&mut self, tree: WidgetId, item: ItemId) -> bool;

    /// Whether the widget declares the named signal
    fn has_signal(&self, id: WidgetId, signal: &str) -> bool;

    /// Emit an object-selection signal carrying a remote object id
    fn emit_selection(&mut self, tree: WidgetId, signal: &str, object_id: i64) -> bool;
}

/// Scene, viewport and debugger control
pub trait EditorHost: UiTree {
    fn play_main_scene(&mut self);

    fn play_custom_scene(&mut self, scene_path: &str);

    fn play_current_scene(&mut self);

    fn stop_playing_scene(&mut self);

    fn is_playing_scene(&self) -> bool;

    /// Capture a viewport's current texture; `None` when the viewport does
    /// not exist or has no texture yet
    fn capture_viewport(&mut self, viewport: EditorViewport) -> Option<Image>;

    /// Encode and write a capture; the engine owns the PNG encoder
    fn save_png(&mut self, image: &Image, path: &Path) -> io::Result<()>;

    /// Whether a debugger session is alive
    fn debugger_active(&self) -> bool;

    /// Whether the session is stopped at a breakpoint or error
    fn debugger_paused(&self) -> bool;

    fn debugger_debuggable(&self) -> bool;

    /// Forward a control message to the session; false when no session
    fn debugger_send(&mut self, command: DebugCommand) -> bool;

    /// Arm a breakpoint in the live debugger session
    fn session_set_breakpoint(&mut self, path: &str, line: u32, enabled: bool);

    /// Arm a breakpoint in the code editor widget. `line` is 0-indexed, as
    /// the widget counts lines.
    fn set_source_breakpoint(
        &mut self,
        path: &str,
        line: u32,
        enabled: bool,
    ) -> Result<(), String>;
}
