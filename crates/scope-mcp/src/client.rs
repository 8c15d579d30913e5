//! Stream-socket client with request/response correlation
//!
//! One outbound connection per adapter process. A background reader task
//! routes each incoming frame either to the waiter registered under its id
//! or, for id-less frames, to the output-notification ring. Writes are
//! serialised behind a mutex so concurrent tool handlers cannot interleave
//! line frames.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{oneshot, Notify};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use scope_core::envelope::{parse_frame, Frame, OutputRecord, Reply, Request};
use scope_core::{Result, ScopeError};

/// Default per-request deadline
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

/// Output notifications kept while nobody is reading them. The ring absorbs
/// bursts; the editor's output mirror stays the source of truth.
const OUTPUT_RING_CAPACITY: usize = 1000;

struct ClientInner {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    next_id: AtomicU64,
    waiters: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    connected: AtomicBool,
    output_ring: Mutex<VecDeque<OutputRecord>>,
    disconnected: Notify,
}

/// Connection to an editor server
#[derive(Clone)]
pub struct EditorClient {
    inner: Arc<ClientInner>,
}

impl EditorClient {
    /// Connect and spawn the reader task
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|e| ScopeError::Transport(format!("connect {}: {e}", socket_path.display())))?;
        let (read_half, write_half) = stream.into_split();

        let inner = Arc::new(ClientInner {
            writer: tokio::sync::Mutex::new(write_half),
            next_id: AtomicU64::new(0),
            waiters: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            output_ring: Mutex::new(VecDeque::new()),
            disconnected: Notify::new(),
        });

        tokio::spawn(read_loop(inner.clone(), read_half));

        info!(path = %socket_path.display(), "connected to editor");
        Ok(Self { inner })
    }

    /// Bounded connect: attempt `attempts` times with linearly growing
    /// delays (0 s, 1 s, 2 s, …) between them
    pub async fn connect_with_retry(socket_path: &Path, attempts: u32) -> Result<Self> {
        let mut last_error = ScopeError::Transport("no connection attempts made".into());
        for attempt in 0..attempts {
            if attempt > 0 {
                info!(attempt = attempt + 1, attempts, "retrying editor connection");
                sleep(Duration::from_secs(u64::from(attempt))).await;
            }
            match Self::connect(socket_path).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    warn!(error = %e, "connection attempt failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Resolves when the connection is lost
    pub async fn closed(&self) {
        let notified = self.inner.disconnected.notified();
        tokio::pin!(notified);
        // register interest before checking the flag, so a notification
        // landing in between is not lost
        notified.as_mut().enable();
        if !self.is_connected() {
            return;
        }
        notified.await;
    }

    /// One request/reply round trip with the default deadline
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.request_tracked_with_deadline(method, params, REQUEST_DEADLINE)
            .await
            .map(|(_, value)| value)
    }

    /// Like [`request`](Self::request), also returning the id used, for
    /// callers that wait for a deferred second reply on the same id
    pub async fn request_tracked(&self, method: &str, params: Option<Value>) -> Result<(u64, Value)> {
        self.request_tracked_with_deadline(method, params, REQUEST_DEADLINE)
            .await
    }

    pub async fn request_tracked_with_deadline(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<(u64, Value)> {
        if !self.is_connected() {
            return Err(ScopeError::NotConnected);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = Request::new(id, method, params);
        let line = serde_json::to_string(&request)?;

        let value = self.wait_for_reply(id, deadline, Some(line)).await?;
        Ok((id, value))
    }

    /// Re-arm a waiter for a deferred completion on an already-answered id
    pub async fn wait_followup(&self, id: u64, deadline: Duration) -> Result<Value> {
        if !self.is_connected() {
            return Err(ScopeError::NotConnected);
        }
        self.wait_for_reply(id, deadline, None).await
    }

    /// Register a waiter, optionally write the request line, then await the
    /// reply under the deadline. The waiter is registered before any bytes
    /// hit the socket and removed on every exit path.
    async fn wait_for_reply(
        &self,
        id: u64,
        deadline: Duration,
        line: Option<String>,
    ) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = lock_waiters(&self.inner);
            waiters.insert(id, tx);
        }
        let guard = WaiterGuard {
            inner: self.inner.clone(),
            id,
        };

        if let Some(line) = line {
            debug!(id, "sending {line}");
            let mut writer = self.inner.writer.lock().await;
            let write = async {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            };
            if let Err(e) = write.await {
                return Err(ScopeError::Transport(format!("write failed: {e}")));
            }
        }

        let reply = match timeout(deadline, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(ScopeError::Cancelled),
            Err(_) => return Err(ScopeError::Timeout),
        };
        drop(guard);

        if let Some(error) = reply.error {
            return Err(ScopeError::Editor {
                code: error.code,
                message: error.message,
            });
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }

    /// Drain (or copy) the buffered output notifications
    pub fn buffered_output(&self, clear: bool) -> Vec<OutputRecord> {
        let mut ring = self
            .inner
            .output_ring
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if clear {
            ring.drain(..).collect()
        } else {
            ring.iter().cloned().collect()
        }
    }
}

/// Removes the waiter slot even when the awaiting future is dropped
/// (cancellation), keeping the map bounded.
struct WaiterGuard {
    inner: Arc<ClientInner>,
    id: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        lock_waiters(&self.inner).remove(&self.id);
    }
}

fn lock_waiters(inner: &ClientInner) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
    inner
        .waiters
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_loop(inner: Arc<ClientInner>, read_half: OwnedReadHalf) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("editor closed the connection");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                handle_frame(&inner, trimmed);
            }
            Err(e) => {
                error!(error = %e, "socket read failed");
                break;
            }
        }
    }

    inner.connected.store(false, Ordering::SeqCst);
    // fail every outstanding waiter; dropping the senders wakes the futures
    lock_waiters(&inner).clear();
    inner.disconnected.notify_waiters();
}

fn handle_frame(inner: &Arc<ClientInner>, line: &str) {
    let frame = match parse_frame(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "unparseable frame from editor");
            return;
        }
    };

    match frame {
        Frame::Reply(reply) => {
            let waiter = lock_waiters(inner).remove(&reply.id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(reply);
                }
                None => debug!(id = reply.id, "dropping stale reply"),
            }
        }
        Frame::Notification(notification) => {
            if notification.method != OutputRecord::METHOD {
                debug!(method = %notification.method, "ignoring unknown notification");
                return;
            }
            let Ok(record) = serde_json::from_value::<OutputRecord>(notification.params) else {
                return;
            };
            let mut ring = inner
                .output_ring
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            ring.push_back(record);
            while ring.len() > OUTPUT_RING_CAPACITY {
                ring.pop_front();
            }
        }
    }
}
