//! Read-only extraction from editor widgets
//!
//! Linearises tree widgets into indented text and scrapes name/value pairs
//! out of inspector property rows. The property widgets have no value API;
//! each class hides its value in a different child control.

use serde::Serialize;

use crate::finder::find_all_by_class;
use crate::host::{ItemId, UiTree, WidgetId};

/// One scraped inspector property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyEntry {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub class: String,
}

/// Linearise a tree widget: two spaces per depth, columns joined by `" | "`
pub fn tree_text(ui: &impl UiTree, tree: WidgetId) -> String {
    let Some(root) = ui.tree_root_item(tree) else {
        return String::new();
    };
    let mut out = String::new();
    append_item_text(ui, tree, root, 0, &mut out);
    out
}

fn append_item_text(ui: &impl UiTree, tree: WidgetId, item: ItemId, depth: usize, out: &mut String) {
    let columns = ui.tree_columns(tree);
    let mut line = String::new();
    for column in 0..columns {
        let text = ui.item_text(tree, item, column);
        if !text.is_empty() {
            if !line.is_empty() {
                line.push_str(" | ");
            }
            line.push_str(&text);
        }
    }

    if !line.is_empty() {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&line);
        out.push('\n');
    }

    for child in ui.item_children(tree, item) {
        append_item_text(ui, tree, child, depth + 1, out);
    }
}

/// Linearise the remote scene tree, annotating each node with the type
/// recovered from its tooltip's parenthesised suffix
pub fn scene_tree_text(ui: &impl UiTree, tree: WidgetId) -> String {
    let Some(root) = ui.tree_root_item(tree) else {
        return String::new();
    };
    let mut out = String::new();
    append_scene_item_text(ui, tree, root, 0, &mut out);
    out
}

fn append_scene_item_text(
    ui: &impl UiTree,
    tree: WidgetId,
    item: ItemId,
    depth: usize,
    out: &mut String,
) {
    let name = ui.item_text(tree, item, 0);
    if !name.is_empty() {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&name);
        if let Some(node_type) = tooltip_type(&ui.item_tooltip(tree, item, 0)) {
            out.push_str(" (");
            out.push_str(&node_type);
            out.push(')');
        }
        out.push('\n');
    }

    for child in ui.item_children(tree, item) {
        append_scene_item_text(ui, tree, child, depth + 1, out);
    }
}

/// Tooltips read like `NodeName (Type)`; pull out the parenthesised part
fn tooltip_type(tooltip: &str) -> Option<String> {
    let start = tooltip.find('(')?;
    let end = tooltip[start..].find(')')? + start;
    let inner = &tooltip[start + 1..end];
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Navigate a tree by slash-separated path components. A leading component
/// equal to the root's own label is skipped, so `/root/Main/Player` and
/// `Main/Player` land on the same item.
pub fn find_item_by_path(ui: &impl UiTree, tree: WidgetId, node_path: &str) -> Option<ItemId> {
    let root = ui.tree_root_item(tree)?;
    let parts: Vec<&str> = node_path.split('/').filter(|p| !p.is_empty()).collect();

    let mut current = root;
    let mut index = 0;
    if parts.first() == Some(&ui.item_text(tree, root, 0).as_str()) {
        index = 1;
    }

    while index < parts.len() {
        let next = ui
            .item_children(tree, current)
            .into_iter()
            .find(|&child| ui.item_text(tree, child, 0) == parts[index])?;
        current = next;
        index += 1;
    }

    Some(current)
}

/// Scrape every inspector property row under a widget
pub fn collect_properties(ui: &impl UiTree, inspector: WidgetId) -> Vec<PropertyEntry> {
    let mut entries = Vec::new();
    collect_from(ui, inspector, &mut entries);
    entries
}

fn collect_from(ui: &impl UiTree, id: WidgetId, entries: &mut Vec<PropertyEntry>) {
    if let Some(class) = ui.widget_class(id) {
        if class.starts_with("EditorProperty") {
            if let Some(name) = property_name(ui, id) {
                entries.push(PropertyEntry {
                    value: extract_value(ui, id, &class),
                    name,
                    class,
                });
            }
        }
    }

    for child in ui.widget_children(id) {
        collect_from(ui, child, entries);
    }
}

fn property_name(ui: &impl UiTree, id: WidgetId) -> Option<String> {
    if let Some(label) = ui.property_label(id) {
        if !label.is_empty() {
            return Some(label);
        }
    }
    // fall back to the first non-empty label child
    find_all_by_class(ui, id, "Label")
        .into_iter()
        .filter_map(|label| ui.plain_text(label))
        .find(|text| !text.is_empty())
}

fn extract_value(ui: &impl UiTree, id: WidgetId, class: &str) -> String {
    match class {
        "EditorPropertyNil" => return "null".to_string(),
        "EditorPropertyInteger" | "EditorPropertyFloat" => {
            if let Some(value) = first_spin_value(ui, id) {
                return format_number(value);
            }
        }
        "EditorPropertyText" => {
            if let Some(text) = first_child_text(ui, id, "LineEdit") {
                return text;
            }
        }
        "EditorPropertyCheck" => {
            if let Some(check) = find_all_by_class(ui, id, "CheckBox")
                .into_iter()
                .find_map(|c| ui.check_state(c))
            {
                return if check { "true" } else { "false" }.to_string();
            }
        }
        "EditorPropertyObjectID" | "EditorPropertyArray" => {
            if let Some(text) = first_child_text(ui, id, "Button") {
                return text;
            }
        }
        _ if class.starts_with("EditorPropertyVector") => {
            let values: Vec<String> = find_all_by_class(ui, id, "EditorSpinSlider")
                .into_iter()
                .filter_map(|slider| ui.spin_value(slider))
                .map(format_number)
                .collect();
            if !values.is_empty() {
                return format!("({})", values.join(", "));
            }
        }
        _ => {}
    }

    // generic fallback for classes with no dedicated extraction
    first_child_text(ui, id, "LineEdit")
        .or_else(|| first_child_text(ui, id, "Button"))
        .unwrap_or_default()
}

fn first_spin_value(ui: &impl UiTree, id: WidgetId) -> Option<f64> {
    find_all_by_class(ui, id, "EditorSpinSlider")
        .into_iter()
        .find_map(|slider| ui.spin_value(slider))
}

fn first_child_text(ui: &impl UiTree, id: WidgetId, class: &str) -> Option<String> {
    find_all_by_class(ui, id, class)
        .into_iter()
        .find_map(|child| ui.plain_text(child))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
