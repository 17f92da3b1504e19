//! # lear common library
//!
//! Shared code for the lear explorer:
//! - Common error type
//! - TOML bootstrap configuration and root folder resolution
//! - Event-stream framing and sinks used by the analysis relay

pub mod config;
pub mod error;
pub mod sse;

pub use error::{Error, Result};
