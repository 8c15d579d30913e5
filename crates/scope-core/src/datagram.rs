//! Datagram envelopes for the game helper
//!
//! One request per datagram, one reply per datagram. Requests carry a `cmd`
//! field selecting the operation; replies are either a success body or an
//! `{"error": …}` object. Pairing is by the caller's ephemeral source port.

use serde_json::{json, Value};

use crate::error::{Result, ScopeError};
use crate::input::{parse_input_event, InputEvent};

/// A decoded game-helper request
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    Screenshot,
    Evaluate { expression: String },
    Input(InputEvent),
}

impl GameCommand {
    /// Encode the command for the wire
    pub fn to_payload(&self) -> Value {
        match self {
            GameCommand::Screenshot => json!({"cmd": "screenshot"}),
            GameCommand::Evaluate { expression } => {
                json!({"cmd": "evaluate", "expression": expression})
            }
            GameCommand::Input(event) => {
                let mut payload = input_event_payload(event);
                payload["cmd"] = json!("input");
                payload
            }
        }
    }
}

fn input_event_payload(event: &InputEvent) -> Value {
    match event {
        InputEvent::Action { action, pressed } => {
            json!({"type": "action", "action": action, "pressed": pressed})
        }
        InputEvent::Key { key, pressed } => {
            json!({"type": "key", "key": key_name(*key), "pressed": pressed})
        }
        InputEvent::MouseButton {
            button,
            pressed,
            x,
            y,
        } => json!({
            "type": "mouse_button",
            "button": mouse_button_name(*button),
            "pressed": pressed,
            "x": x,
            "y": y,
        }),
        InputEvent::MouseMotion {
            x,
            y,
            relative_x,
            relative_y,
        } => json!({
            "type": "mouse_motion",
            "x": x,
            "y": y,
            "relative_x": relative_x,
            "relative_y": relative_y,
        }),
    }
}

fn key_name(key: crate::input::Key) -> String {
    use crate::input::Key;
    match key {
        Key::Char(ch) => ch.to_string(),
        Key::Space => "space".into(),
        Key::Enter => "enter".into(),
        Key::Escape => "escape".into(),
        Key::Tab => "tab".into(),
        Key::Backspace => "backspace".into(),
        Key::Delete => "delete".into(),
        Key::Up => "up".into(),
        Key::Down => "down".into(),
        Key::Left => "left".into(),
        Key::Right => "right".into(),
        Key::Shift => "shift".into(),
        Key::Ctrl => "ctrl".into(),
        Key::Alt => "alt".into(),
        Key::Function(n) => format!("f{n}"),
    }
}

fn mouse_button_name(button: crate::input::MouseButton) -> &'static str {
    use crate::input::MouseButton;
    match button {
        MouseButton::Left => "left",
        MouseButton::Right => "right",
        MouseButton::Middle => "middle",
        MouseButton::WheelUp => "wheel_up",
        MouseButton::WheelDown => "wheel_down",
    }
}

/// Decode one incoming datagram into a command
pub fn parse_command(data: &[u8]) -> Result<GameCommand> {
    let value: Value = serde_json::from_slice(data)?;
    let cmd = value
        .get("cmd")
        .and_then(Value::as_str)
        .ok_or_else(|| ScopeError::Protocol("missing cmd field".into()))?;

    match cmd {
        "screenshot" => Ok(GameCommand::Screenshot),
        "evaluate" => {
            let expression = value
                .get("expression")
                .and_then(Value::as_str)
                .ok_or_else(|| ScopeError::Protocol("missing required field: expression".into()))?;
            Ok(GameCommand::Evaluate {
                expression: expression.to_string(),
            })
        }
        "input" => Ok(GameCommand::Input(parse_input_event(&value)?)),
        other => Err(ScopeError::Protocol(format!("unknown cmd: {other}"))),
    }
}

/// Encode an error reply datagram
pub fn error_reply(message: &str) -> Vec<u8> {
    json!({"error": message}).to_string().into_bytes()
}

/// Decode a reply datagram, turning `{"error": …}` into `Err`
pub fn parse_reply(data: &[u8]) -> Result<Value> {
    let value: Value = serde_json::from_slice(data)?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(ScopeError::Game(message.to_string()));
    }
    Ok(value)
}
