//! # scope-core
//!
//! Core types shared by every editor-scope component:
//! - Request/reply/notification envelopes and error codes
//! - Socket path derivation and the well-known `/tmp` file locations
//! - The autoload-overrides side-file
//! - RGBA image model used by viewport captures
//! - Synthetic input events and their wire name tables
//! - Datagram command envelopes for the game helper

pub mod datagram;
pub mod envelope;
pub mod error;
pub mod image;
pub mod input;
pub mod overrides;
pub mod paths;

pub use datagram::GameCommand;
pub use envelope::{error_codes, Frame, Notification, OutputKind, OutputRecord, Reply, ReplyError, Request};
pub use error::{Result, ScopeError};
pub use image::Image;
pub use input::{InputEvent, Key, MouseButton};
pub use overrides::Overrides;
