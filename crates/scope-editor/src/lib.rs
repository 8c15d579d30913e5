//! # scope-editor
//!
//! The editor-side half of the editor-scope fabric. One `EditorServer` runs
//! inside each editor process, multiplexes adapter connections on a
//! project-scoped Unix socket, and drives the editor between frames.
//!
//! The editor itself is reached through two traits: [`host::UiTree`] for
//! widget reflection and [`host::EditorHost`] for scene, viewport and
//! debugger control. Everything here is cooperative and single-threaded:
//! the embedding calls [`EditorServer::tick`] once per frame and no work
//! blocks inside a tick.

pub mod breakpoints;
pub mod finder;
pub mod host;
pub mod inspect;
pub mod launch;
pub mod output;
pub mod router;
pub mod server;
pub mod stream;

mod handlers;

#[cfg(test)]
pub(crate) mod testing;

pub use host::{DebugCommand, EditorHost, EditorViewport, ItemId, UiTree, WidgetId};
pub use server::EditorServer;
pub use stream::{ClientToken, StreamServer};
