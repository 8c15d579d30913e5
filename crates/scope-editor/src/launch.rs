//! Launch bookkeeping: auto-stop timers and pending-launch records
//!
//! Both records are invalidated by the launch counter, which moves on every
//! scene launch and on every observed play-to-stop transition; a timer or
//! detector armed for an earlier launch must never act on a later one.

use crate::stream::ClientToken;

/// How long after a launch the startup-fault detector samples the debugger
pub const STARTUP_CHECK_WINDOW: f64 = 1.5;

/// Frame-driven countdown that stops a scene left running too long
#[derive(Debug, Clone, PartialEq)]
pub struct AutoStop {
    /// Launch counter value captured at arming
    pub launch_id: u64,
    /// Seconds left before the stop fires
    pub remaining: f64,
}

/// A run-scene request whose final outcome is still owed to the adapter
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLaunch {
    pub request_id: u64,
    pub client: ClientToken,
    pub action: &'static str,
    pub scene_path: Option<String>,
    /// Seconds until the detector runs
    pub due_in: f64,
}
