//! Datagram client for game-side operations
//!
//! Game screenshots, expression evaluation and synthetic input never cross
//! the editor: the adapter talks to the game helper's loopback port
//! directly. Each call uses a fresh ephemeral socket (the reply is paired by
//! source port) and a deadline; a game that crashed mid-call simply never
//! answers, which the caller sees as a timeout.

use std::time::Duration;

use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use scope_core::datagram::{parse_reply, GameCommand};
use scope_core::paths::GAME_HELPER_PORT;
use scope_core::{InputEvent, Result, ScopeError};

/// Default datagram deadline
pub const GAME_DEADLINE: Duration = Duration::from_secs(5);

const MAX_DATAGRAM: usize = 4096;

/// Client side of the game helper protocol
#[derive(Debug, Clone)]
pub struct GameClient {
    port: u16,
    deadline: Duration,
}

impl Default for GameClient {
    fn default() -> Self {
        Self {
            port: GAME_HELPER_PORT,
            deadline: GAME_DEADLINE,
        }
    }
}

impl GameClient {
    pub fn new(port: u16, deadline: Duration) -> Self {
        Self { port, deadline }
    }

    pub async fn screenshot(&self) -> Result<Value> {
        self.send(&GameCommand::Screenshot).await
    }

    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.send(&GameCommand::Evaluate {
            expression: expression.to_string(),
        })
        .await
    }

    pub async fn input(&self, event: InputEvent) -> Result<Value> {
        self.send(&GameCommand::Input(event)).await
    }

    async fn send(&self, command: &GameCommand) -> Result<Value> {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .map_err(|e| ScopeError::Transport(format!("bind datagram socket: {e}")))?;
        socket
            .connect(("127.0.0.1", self.port))
            .await
            .map_err(|e| ScopeError::Transport(format!("connect datagram socket: {e}")))?;

        let payload = command.to_payload().to_string();
        socket
            .send(payload.as_bytes())
            .await
            .map_err(|e| ScopeError::Transport(format!("send datagram: {e}")))?;

        let mut buffer = vec![0u8; MAX_DATAGRAM];
        let len = timeout(self.deadline, socket.recv(&mut buffer))
            .await
            .map_err(|_| ScopeError::Timeout)?
            .map_err(|e| ScopeError::Transport(format!("receive datagram: {e}")))?;

        parse_reply(&buffer[..len])
    }
}
