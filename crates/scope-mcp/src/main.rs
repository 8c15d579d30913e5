//! scope-mcp adapter binary
//!
//! One adapter per MCP client session. Resolves the project-scoped socket
//! path, connects to the editor with a bounded retry, then serves MCP over
//! stdio. The process exits non-zero when the initial connection cannot be
//! established or when the editor connection is lost mid-session; the MCP
//! host respawns it for the next invocation.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use scope_core::paths;
use scope_mcp::{EditorClient, GameClient, LiveBackend};

const CONNECT_ATTEMPTS: u32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    // all logging goes to stderr; stdout is reserved for MCP frames
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let socket_path = resolve_socket_path();
    info!(path = %socket_path.display(), "resolving editor socket");

    let editor = EditorClient::connect_with_retry(&socket_path, CONNECT_ATTEMPTS)
        .await
        .with_context(|| {
            format!(
                "could not connect to the editor at {} (is the editor running with the \
                 scope extension enabled?)",
                socket_path.display()
            )
        })?;

    let backend = Arc::new(LiveBackend::new(editor.clone(), GameClient::default()));

    info!("serving MCP on stdio");
    tokio::select! {
        result = scope_mcp::stdio::run(backend) => {
            result.context("stdio transport failed")?;
            info!("orderly shutdown");
            Ok(())
        }
        () = editor.closed() => {
            anyhow::bail!("connection to the editor was lost");
        }
    }
}

/// Environment override first, then derivation from the working directory,
/// using the same transform the editor applies to its project directory.
fn resolve_socket_path() -> PathBuf {
    match env::current_dir() {
        Ok(cwd) => paths::resolve_socket_path(&cwd),
        Err(_) => env::var(paths::SOCKET_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(paths::DEFAULT_SOCKET_PATH)),
    }
}
