//! Synthetic input events and their wire name tables
//!
//! The datagram `input` command names keys and mouse buttons as strings; the
//! mapping tables here are part of the wire contract, shared by the adapter
//! (which validates) and the game helper (which synthesises).

use serde_json::Value;

use crate::error::{Result, ScopeError};

/// A key identified by its wire name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Letters and digits, named by their single character
    Char(char),
    Space,
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Shift,
    Ctrl,
    Alt,
    /// Function keys F1..F12
    Function(u8),
}

/// Map a wire key name to a key, `None` for unknown names
pub fn key_from_name(name: &str) -> Option<Key> {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            return Some(Key::Char(ch));
        }
    }

    match name {
        "space" => Some(Key::Space),
        "enter" => Some(Key::Enter),
        "escape" => Some(Key::Escape),
        "tab" => Some(Key::Tab),
        "backspace" => Some(Key::Backspace),
        "delete" => Some(Key::Delete),
        "up" => Some(Key::Up),
        "down" => Some(Key::Down),
        "left" => Some(Key::Left),
        "right" => Some(Key::Right),
        "shift" => Some(Key::Shift),
        "ctrl" => Some(Key::Ctrl),
        "alt" => Some(Key::Alt),
        _ => {
            let digits = name.strip_prefix('f')?;
            let n: u8 = digits.parse().ok()?;
            (1..=12).contains(&n).then_some(Key::Function(n))
        }
    }
}

/// A mouse button identified by its wire name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    WheelUp,
    WheelDown,
}

/// Map a wire button name to a button, `None` for unknown names
pub fn mouse_button_from_name(name: &str) -> Option<MouseButton> {
    match name {
        "left" => Some(MouseButton::Left),
        "right" => Some(MouseButton::Right),
        "middle" => Some(MouseButton::Middle),
        "wheel_up" => Some(MouseButton::WheelUp),
        "wheel_down" => Some(MouseButton::WheelDown),
        _ => None,
    }
}

/// A synthesised input event, ready for the game's input dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Action {
        action: String,
        pressed: bool,
    },
    Key {
        key: Key,
        pressed: bool,
    },
    MouseButton {
        button: MouseButton,
        pressed: bool,
        x: f64,
        y: f64,
    },
    MouseMotion {
        x: f64,
        y: f64,
        relative_x: f64,
        relative_y: f64,
    },
}

fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ScopeError::Protocol(format!("missing required field: {field}")))
}

fn optional_bool(params: &Value, field: &str, default: bool) -> bool {
    params.get(field).and_then(Value::as_bool).unwrap_or(default)
}

fn optional_f64(params: &Value, field: &str) -> f64 {
    params.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Parse the payload of an `input` datagram into an event
pub fn parse_input_event(params: &Value) -> Result<InputEvent> {
    let event_type = required_str(params, "type")?;
    match event_type {
        "action" => Ok(InputEvent::Action {
            action: required_str(params, "action")?.to_string(),
            pressed: optional_bool(params, "pressed", true),
        }),
        "key" => {
            let name = required_str(params, "key")?;
            let key = key_from_name(name)
                .ok_or_else(|| ScopeError::Protocol(format!("unknown key name: {name}")))?;
            Ok(InputEvent::Key {
                key,
                pressed: optional_bool(params, "pressed", true),
            })
        }
        "mouse_button" => {
            let name = required_str(params, "button")?;
            let button = mouse_button_from_name(name)
                .ok_or_else(|| ScopeError::Protocol(format!("unknown mouse button: {name}")))?;
            Ok(InputEvent::MouseButton {
                button,
                pressed: optional_bool(params, "pressed", true),
                x: optional_f64(params, "x"),
                y: optional_f64(params, "y"),
            })
        }
        "mouse_motion" => Ok(InputEvent::MouseMotion {
            x: optional_f64(params, "x"),
            y: optional_f64(params, "y"),
            relative_x: optional_f64(params, "relative_x"),
            relative_y: optional_f64(params, "relative_y"),
        }),
        other => Err(ScopeError::Protocol(format!(
            "unknown input type: {other} (expected: action, key, mouse_button, mouse_motion)"
        ))),
    }
}
