//! Widget location with liveness-checked caching
//!
//! Handlers locate editor widgets by runtime class name plus a
//! version-specific path fragment. Hits are cached, but the editor recreates
//! debugger panels across play/stop cycles, so every cache lookup
//! re-validates the handle and falls back to a fresh search. The remote
//! scene tree and the remote-view toggle come and go with the game process
//! and are never cached.

use std::collections::HashMap;

use crate::host::{UiTree, WidgetId};

/// The widgets the handlers look up by pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKey {
    /// Rich-text log in the Output bottom panel
    OutputPanel,
    /// Errors tab tree inside the debugger
    ErrorsTree,
    /// Performance monitors tree inside the debugger
    MonitorsTree,
    /// Rich-text stack trace header (current editor versions)
    StackTraceHeader,
    /// Plain-label stack trace header (older editor versions)
    StackTraceHeaderLegacy,
    /// Stack frames tree inside the Stack Trace panel
    StackFramesTree,
    /// Inspector showing locals while the debugger is paused
    DebuggerInspector,
    /// The main Inspector dock
    MainInspector,
}

/// Liveness-validated widget cache
#[derive(Default)]
pub struct WidgetFinder {
    cache: HashMap<WidgetKey, WidgetId>,
}

impl WidgetFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate a widget, reusing the cached handle when it is still alive
    pub fn find(&mut self, ui: &impl UiTree, key: WidgetKey) -> Option<WidgetId> {
        if let Some(&cached) = self.cache.get(&key) {
            if ui.is_alive(cached) {
                return Some(cached);
            }
            self.cache.remove(&key);
        }

        let found = search(ui, key)?;
        self.cache.insert(key, found);
        Some(found)
    }

    /// Drop every cached handle; the next lookup searches fresh
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// The remote scene tree, never cached: it exists only while a game is
    /// attached
    pub fn remote_scene_tree(&self, ui: &impl UiTree) -> Option<WidgetId> {
        let root = ui.root_widget()?;
        find_all_by_class(ui, root, "EditorDebuggerTree")
            .into_iter()
            .next()
    }

    /// The Remote toggle in the Scene dock, never cached
    pub fn remote_toggle(&self, ui: &impl UiTree) -> Option<WidgetId> {
        let root = ui.root_widget()?;
        find_all_by_class(ui, root, "Button")
            .into_iter()
            .find(|&id| {
                ui.widget_path(id)
                    .is_some_and(|path| path.contains("/Scene/"))
                    && ui.plain_text(id).as_deref() == Some("Remote")
            })
    }
}

/// Collect every widget that is (or inherits) the given class, depth-first
pub fn find_all_by_class(ui: &impl UiTree, root: WidgetId, class: &str) -> Vec<WidgetId> {
    let mut results = Vec::new();
    collect_by_class(ui, root, class, &mut results);
    results
}

fn collect_by_class(ui: &impl UiTree, id: WidgetId, class: &str, results: &mut Vec<WidgetId>) {
    if ui.is_class(id, class) {
        results.push(id);
    }
    for child in ui.widget_children(id) {
        collect_by_class(ui, child, class, results);
    }
}

fn search(ui: &impl UiTree, key: WidgetKey) -> Option<WidgetId> {
    let root = ui.root_widget()?;

    let matches_path = |id: WidgetId, pred: &dyn Fn(&str) -> bool| {
        ui.widget_path(id).is_some_and(|path| pred(&path))
    };

    match key {
        WidgetKey::OutputPanel => find_all_by_class(ui, root, "RichTextLabel")
            .into_iter()
            .find(|&id| {
                matches_path(id, &|path| {
                    path.contains("EditorLog")
                        || (path.contains("EditorBottomPanel") && path.contains("/Output/"))
                })
            }),
        WidgetKey::ErrorsTree => find_all_by_class(ui, root, "Tree").into_iter().find(|&id| {
            matches_path(id, &|path| {
                is_debugger_path(path) && path.contains("/Errors")
            })
        }),
        WidgetKey::MonitorsTree => find_all_by_class(ui, root, "Tree").into_iter().find(|&id| {
            matches_path(id, &|path| {
                is_debugger_path(path) && path.contains("/Monitors")
            })
        }),
        WidgetKey::StackTraceHeader => find_all_by_class(ui, root, "RichTextLabel")
            .into_iter()
            .find(|&id| matches_path(id, &|path| path.contains("/Stack Trace/"))),
        WidgetKey::StackTraceHeaderLegacy => find_all_by_class(ui, root, "Label")
            .into_iter()
            .find(|&id| {
                matches_path(id, &|path| {
                    path.contains("/Stack Trace/") && path.contains("@HBoxContainer")
                })
            }),
        WidgetKey::StackFramesTree => find_all_by_class(ui, root, "Tree")
            .into_iter()
            .find(|&id| matches_path(id, &|path| path.contains("/Stack Trace/"))),
        WidgetKey::DebuggerInspector => find_all_by_class(ui, root, "EditorDebuggerInspector")
            .into_iter()
            .next(),
        WidgetKey::MainInspector => find_all_by_class(ui, root, "EditorInspector")
            .into_iter()
            .find(|&id| {
                matches_path(id, &|path| {
                    path.contains("DockSlotRightUL/Inspector/")
                        || path.contains("DockSlotRightBL/Inspector/")
                })
            }),
    }
}

/// Debugger container path fragment, which moved between editor versions
fn is_debugger_path(path: &str) -> bool {
    path.contains("EditorDebuggerNode") || path.contains("/Debugger/")
}
