//! # scope-mcp
//!
//! The adapter process: one per MCP client session. Terminates an MCP stdio
//! connection, forwards tool invocations as line-framed JSON requests on the
//! project-scoped Unix socket, and correlates replies by request id. Game
//! operations (game screenshots, expression evaluation, synthetic input)
//! bypass the editor and talk to the game helper's datagram port directly.

pub mod backend;
pub mod client;
pub mod game;
pub mod mcp;
pub mod stdio;
pub mod tools;

pub use backend::{EditorScope, LiveBackend};
pub use client::EditorClient;
pub use game::GameClient;
