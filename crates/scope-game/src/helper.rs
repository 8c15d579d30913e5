//! Frame-polled datagram server
//!
//! One request datagram, one reply datagram, no per-client state. Handling
//! one request per frame is enough: the operations are idempotent and
//! callers time out and retry. Request/reply pairing is by the caller's
//! ephemeral source port.

use std::net::UdpSocket;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, info, warn};

use scope_core::datagram::{error_reply, parse_command, GameCommand};
use scope_core::overrides::take_overrides;
use scope_core::{paths, Result};

use crate::host::GameHost;

const MAX_DATAGRAM: usize = 4096;

/// The in-game datagram server
pub struct GameHelper<H: GameHost> {
    host: H,
    socket: UdpSocket,
    screenshot_path: PathBuf,
}

impl<H: GameHost> GameHelper<H> {
    /// Bind the well-known loopback port and consume any pending overrides
    pub fn start(host: H) -> Result<Self> {
        let mut helper = Self::bind(host, paths::GAME_HELPER_PORT)?;
        helper.apply_overrides(Path::new(paths::OVERRIDES_PATH));
        Ok(helper)
    }

    /// Bind a specific port (0 picks an ephemeral one; used by tests)
    pub fn bind(host: H, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", port))?;
        socket.set_nonblocking(true)?;
        debug!(port = socket.local_addr()?.port(), "game helper listening");
        Ok(Self {
            host,
            socket,
            screenshot_path: PathBuf::from(paths::GAME_SCREENSHOT_PATH),
        })
    }

    pub fn local_port(&self) -> u16 {
        self.socket
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Redirect the screenshot file (used by tests)
    pub fn set_screenshot_path(&mut self, path: PathBuf) {
        self.screenshot_path = path;
    }

    /// Consume the overrides side-file: read, apply, delete. One shot, so a
    /// second startup finds nothing and applies nothing.
    pub fn apply_overrides(&mut self, path: &Path) {
        let overrides = match take_overrides(path) {
            Ok(Some(overrides)) => overrides,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "could not read overrides side-file");
                return;
            }
        };

        for (autoload, properties) in &overrides {
            for (property, value) in properties {
                if self.host.set_autoload_property(autoload, property, value) {
                    info!(autoload, property, "applied override");
                } else {
                    warn!(autoload, property, "override target not found");
                }
            }
        }
    }

    /// Serve at most one request; called once per frame
    pub fn poll(&mut self) {
        let mut buffer = [0u8; MAX_DATAGRAM];
        let (len, peer) = match self.socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!(error = %e, "datagram receive failed");
                return;
            }
        };

        let reply = self.handle(&buffer[..len]);
        if let Err(e) = self.socket.send_to(&reply, peer) {
            warn!(error = %e, "datagram reply failed");
        }
    }

    fn handle(&mut self, data: &[u8]) -> Vec<u8> {
        let command = match parse_command(data) {
            Ok(command) => command,
            Err(e) => return error_reply(&e.to_string()),
        };

        match command {
            GameCommand::Screenshot => self.handle_screenshot(),
            GameCommand::Evaluate { expression } => match self.host.evaluate(&expression) {
                Ok(result) => json!({"result": result}).to_string().into_bytes(),
                Err(message) => error_reply(&message),
            },
            GameCommand::Input(event) => match self.host.dispatch_input(event) {
                Ok(()) => json!({"success": true}).to_string().into_bytes(),
                Err(message) => error_reply(&message),
            },
        }
    }

    fn handle_screenshot(&mut self) -> Vec<u8> {
        let image = match self.host.capture_frame() {
            Ok(image) => image,
            Err(message) => return error_reply(&message),
        };
        if let Err(e) = self.host.save_png(&image, &self.screenshot_path) {
            return error_reply(&format!("failed to save screenshot: {e}"));
        }

        json!({
            "path": self.screenshot_path.display().to_string(),
            "width": image.width(),
            "height": image.height(),
        })
        .to_string()
        .into_bytes()
    }
}
