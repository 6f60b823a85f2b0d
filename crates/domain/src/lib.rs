//! `ta-domain`: shared types for the TalkAgent workspace.
//!
//! Everything that crosses a crate boundary lives here: personas and turn
//! requests, the stream fragments a live backend pushes during a turn, the
//! language table, the configuration file model, and the workspace-wide
//! error type.

pub mod config;
pub mod error;
pub mod language;
pub mod persona;
pub mod stream;
