//! # scope-game
//!
//! The game-side half of the fabric: a datagram server on a fixed loopback
//! port that serves screenshots, expression evaluation and synthetic input
//! while a scene is playing, plus the one-shot consumption of the autoload
//! overrides side-file during startup.
//!
//! Like the editor server, everything is cooperative: the game's autoload
//! calls [`GameHelper::poll`] once per frame.

pub mod helper;
pub mod host;

pub use helper::GameHelper;
pub use host::GameHost;
