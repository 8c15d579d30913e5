//! Trait seam to the running game

use std::io;
use std::path::Path;

use serde_json::Value;

use scope_core::{Image, InputEvent};

/// What the game engine provides to the helper.
///
/// Errors are plain strings; they travel back to the caller verbatim inside
/// an `{"error": …}` datagram.
pub trait GameHost {
    /// Capture the main viewport. Implementations must synchronise with the
    /// end of frame rendering before sampling pixels.
    fn capture_frame(&mut self) -> Result<Image, String>;

    /// Encode and write a capture; the engine owns the PNG encoder
    fn save_png(&mut self, image: &Image, path: &Path) -> io::Result<()>;

    /// Evaluate an expression in the game's scripting context
    fn evaluate(&mut self, expression: &str) -> Result<String, String>;

    /// Feed a synthesised event through the game's input dispatcher
    fn dispatch_input(&mut self, event: InputEvent) -> Result<(), String>;

    /// Apply one autoload property override; false when the autoload or
    /// property does not exist
    fn set_autoload_property(&mut self, autoload: &str, property: &str, value: &Value) -> bool;
}
