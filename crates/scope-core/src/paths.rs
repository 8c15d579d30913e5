//! Well-known filesystem locations and the project-scoped socket path
//!
//! The editor server and the adapter never exchange the socket path; both
//! derive it independently from the project directory name, so the transform
//! here must stay in lockstep on both sides.

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming a full socket path, overriding derivation
pub const SOCKET_ENV_VAR: &str = "EDITOR_SCOPE_SOCKET";

/// Fallback socket path when no project slug can be derived
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/editor-scope.sock";

/// One-shot autoload overrides side-file
pub const OVERRIDES_PATH: &str = "/tmp/editor_scope_overrides.json";

/// Editor viewport capture, overwritten per call
pub const EDITOR_SCREENSHOT_PATH: &str = "/tmp/editor_scope_editor_screenshot.png";

/// Game viewport capture, overwritten per call
pub const GAME_SCREENSHOT_PATH: &str = "/tmp/editor_scope_game_screenshot.png";

/// Fixed loopback port the game helper listens on
pub const GAME_HELPER_PORT: u16 = 6971;

const SOCKET_DIR: &str = "/tmp";
const SOCKET_PREFIX: &str = "editor-scope-";
const SOCKET_EXTENSION: &str = "sock";

/// Sanitise a project directory name into a socket-path slug.
///
/// Lowercase letters and digits pass through; every other run of characters
/// collapses to a single `-`; trailing dashes are trimmed.
pub fn project_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Derive the socket path for a project directory
pub fn socket_path_for_project(project_dir: &Path) -> PathBuf {
    let name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let slug = project_slug(&name);
    if slug.is_empty() {
        return PathBuf::from(DEFAULT_SOCKET_PATH);
    }
    PathBuf::from(SOCKET_DIR).join(format!("{SOCKET_PREFIX}{slug}.{SOCKET_EXTENSION}"))
}

/// Resolve the socket path: environment override first, then derivation
pub fn resolve_socket_path(project_dir: &Path) -> PathBuf {
    match env::var(SOCKET_ENV_VAR) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => socket_path_for_project(project_dir),
    }
}
