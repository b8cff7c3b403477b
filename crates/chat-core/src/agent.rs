//! Core Agent trait definition

use crate::Result;
use async_trait::async_trait;

/// Something that turns one user query into one final answer
///
/// Front ends only see this trait, so the CLI and the form UI can be driven
/// by the real turn controller or by a test double.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer a single query
    ///
    /// Every call starts from a fresh conversation; nothing carries over
    /// between calls.
    async fn process(&self, input: String) -> Result<String>;

    /// Get the agent's name
    fn name(&self) -> &str;
}
