//! Non-blocking stream transport on the project-scoped Unix socket
//!
//! One listener per editor process, many adapter connections. Everything is
//! polled from the frame tick: the accept backlog is drained, each client
//! gets one non-blocking read, complete newline-framed messages are handed
//! back, and replies are written on the same connection in the same
//! iteration.
//!
//! Lifecycle rules (the main correctness story):
//! - before binding, probe the path: a live listener means another editor
//!   owns the socket, so refuse to start and leave the file alone; a dead file
//!   is unlinked and replaced
//! - only the process that created the socket file unlinks it on shutdown
//! - every server-owned descriptor is close-on-exec, so the launched game
//!   child never inherits the listener or a client connection

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::{fs, io};

use nix::libc;
use tracing::{debug, warn};

use scope_core::{Result, ScopeError};

/// Stable handle for one adapter connection
pub type ClientToken = u64;

const READ_CHUNK: usize = 4096;

struct ClientConn {
    token: ClientToken,
    stream: UnixStream,
    buffer: Vec<u8>,
}

/// Multiplexing line-framed server over a Unix stream socket
pub struct StreamServer {
    listener: UnixListener,
    socket_path: PathBuf,
    owns_socket_file: bool,
    clients: Vec<ClientConn>,
    next_token: ClientToken,
}

impl StreamServer {
    /// Probe the path, claim it if unowned, and start listening.
    ///
    /// Fails without touching the file when another process already accepts
    /// connections on it.
    pub fn start(socket_path: &Path) -> Result<Self> {
        match UnixStream::connect(socket_path) {
            Ok(_) => {
                return Err(ScopeError::Transport(format!(
                    "another editor server is already listening on {}",
                    socket_path.display()
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                // stale file from a dead process
                if let Err(e) = fs::remove_file(socket_path) {
                    if e.kind() != ErrorKind::NotFound {
                        return Err(e.into());
                    }
                }
                debug!(path = %socket_path.display(), "removed stale socket file");
            }
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;
        set_cloexec(listener.as_raw_fd());

        debug!(path = %socket_path.display(), "stream server listening");

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            owns_socket_file: true,
            clients: Vec::new(),
            next_token: 1,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// One frame of transport work: drain the accept backlog, give every
    /// client one read, and return the complete messages that produced.
    pub fn poll(&mut self) -> Vec<(ClientToken, String)> {
        self.accept_pending();

        let mut messages = Vec::new();
        let mut closed: Vec<ClientToken> = Vec::new();

        for client in &mut self.clients {
            let mut chunk = [0u8; READ_CHUNK];
            match client.stream.read(&mut chunk) {
                Ok(0) => {
                    debug!(token = client.token, "client closed connection");
                    closed.push(client.token);
                }
                Ok(n) => {
                    client.buffer.extend_from_slice(&chunk[..n]);
                    for line in drain_lines(&mut client.buffer) {
                        messages.push((client.token, line));
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => {
                    warn!(token = client.token, error = %e, "client read failed");
                    closed.push(client.token);
                }
            }
        }

        if !closed.is_empty() {
            self.clients.retain(|c| !closed.contains(&c.token));
        }

        messages
    }

    /// Write one newline-terminated frame to a specific client. Returns
    /// false (and drops the client) when the peer is gone.
    pub fn send(&mut self, token: ClientToken, frame: &str) -> bool {
        let Some(index) = self.clients.iter().position(|c| c.token == token) else {
            return false;
        };

        let mut data = Vec::with_capacity(frame.len() + 1);
        data.extend_from_slice(frame.as_bytes());
        data.push(b'\n');

        match write_all(&self.clients[index].stream, &data) {
            Ok(()) => true,
            Err(e) => {
                warn!(token, error = %e, "client write failed");
                self.clients.remove(index);
                false
            }
        }
    }

    /// Write one frame to every connected client
    pub fn broadcast(&mut self, frame: &str) {
        let tokens: Vec<ClientToken> = self.clients.iter().map(|c| c.token).collect();
        for token in tokens {
            self.send(token, frame);
        }
    }

    /// Close every client and stop listening, unlinking the socket file only
    /// if this server created it.
    pub fn shutdown(&mut self) {
        self.clients.clear();
        if self.owns_socket_file {
            if let Err(e) = fs::remove_file(&self.socket_path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(error = %e, "failed to unlink socket file");
                }
            }
            self.owns_socket_file = false;
        }
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!(error = %e, "failed to set client non-blocking");
                        continue;
                    }
                    set_cloexec(stream.as_raw_fd());
                    suppress_sigpipe(stream.as_raw_fd());

                    let token = self.next_token;
                    self.next_token += 1;
                    debug!(token, "adapter connected");
                    self.clients.push(ClientConn {
                        token,
                        stream,
                        buffer: Vec::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }
}

impl Drop for StreamServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Extract complete newline-terminated messages, leaving any partial tail in
/// the buffer. Empty lines are dropped, not delivered.
fn drain_lines(buffer: &mut Vec<u8>) -> VecDeque<String> {
    let mut lines = VecDeque::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let rest = buffer.split_off(pos + 1);
        let mut line = std::mem::replace(buffer, rest);
        line.pop();
        if !line.is_empty() {
            lines.push_back(String::from_utf8_lossy(&line).into_owned());
        }
    }
    lines
}

/// Mark a descriptor close-on-exec. The game child is spawned from this
/// process; inherited socket descriptors would outlive the server's view of
/// the connection and corrupt the socket when the child exits.
fn set_cloexec(fd: RawFd) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
}

/// Keep a dead peer from raising SIGPIPE inside the editor process. On
/// apple platforms this is a per-socket option; elsewhere the write path
/// passes MSG_NOSIGNAL per send.
#[cfg(any(target_os = "macos", target_os = "ios"))]
fn suppress_sigpipe(fd: RawFd) {
    let one: libc::c_int = 1;
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_NOSIGPIPE,
            std::ptr::addr_of!(one).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn suppress_sigpipe(_fd: RawFd) {}

#[cfg(any(target_os = "macos", target_os = "ios"))]
const SEND_FLAGS: libc::c_int = 0;

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;

fn write_all(stream: &UnixStream, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        let n = unsafe {
            libc::send(
                stream.as_raw_fd(),
                data.as_ptr().cast(),
                data.len(),
                SEND_FLAGS,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        data = &data[n as usize..];
    }
    Ok(())
}
