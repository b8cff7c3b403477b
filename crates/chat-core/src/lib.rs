//! Core abstractions for mcp-math-chat
//!
//! This crate defines the error taxonomy shared by every layer and the
//! [`Agent`] seam the front ends talk to.

pub mod agent;
pub mod error;

pub use agent::Agent;
pub use error::{Error, ErrorKind, Result};
