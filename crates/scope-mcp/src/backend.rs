//! Backend seam for the tool handlers
//!
//! Tool handlers are generic over this trait so the suite can run against a
//! scripted backend; the live implementation pairs the stream-socket client
//! with the datagram client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use scope_core::{InputEvent, Result};

use crate::client::EditorClient;
use crate::game::GameClient;

/// Everything a tool handler can ask of the fabric
#[async_trait]
pub trait EditorScope: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value>;

    /// Request that also reports the id it used, for deferred follow-ups
    async fn request_tracked(&self, method: &str, params: Option<Value>) -> Result<(u64, Value)>;

    /// Wait for a deferred second reply bearing a previously used id
    async fn wait_followup(&self, id: u64, deadline: Duration) -> Result<Value>;

    async fn game_screenshot(&self) -> Result<Value>;

    async fn game_evaluate(&self, expression: &str) -> Result<Value>;

    async fn game_input(&self, event: InputEvent) -> Result<Value>;
}

/// Production backend: editor over the stream socket, game over datagrams
pub struct LiveBackend {
    pub editor: EditorClient,
    pub game: GameClient,
}

impl LiveBackend {
    pub fn new(editor: EditorClient, game: GameClient) -> Self {
        Self { editor, game }
    }
}

#[async_trait]
impl EditorScope for LiveBackend {
    fn is_connected(&self) -> bool {
        self.editor.is_connected()
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.editor.request(method, params).await
    }

    async fn request_tracked(&self, method: &str, params: Option<Value>) -> Result<(u64, Value)> {
        self.editor.request_tracked(method, params).await
    }

    async fn wait_followup(&self, id: u64, deadline: Duration) -> Result<Value> {
        self.editor.wait_followup(id, deadline).await
    }

    async fn game_screenshot(&self) -> Result<Value> {
        self.game.screenshot().await
    }

    async fn game_evaluate(&self, expression: &str) -> Result<Value> {
        self.game.evaluate(expression).await
    }

    async fn game_input(&self, event: InputEvent) -> Result<Value> {
        self.game.input(event).await
    }
}
