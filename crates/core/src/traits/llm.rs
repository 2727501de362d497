//! Chat model trait

use async_trait::async_trait;

use crate::{Result, Turn};

/// Conversational language model interface
///
/// Implementations:
/// - `OllamaChat` - local Ollama chat endpoint (voice-relay-llm)
///
/// # Example
///
/// ```ignore
/// let llm: Arc<dyn ChatModel> = Arc::new(OllamaChat::new(config)?);
/// let reply = llm.chat(&memory.snapshot()).await?;
/// ```
#[async_trait]
pub trait ChatModel: Send + Sync + 'static {
    /// Generate a reply to the ordered conversation history.
    ///
    /// The slice always starts with the system persona turn. Failures
    /// carry a [`crate::ChatFailure`] class so the caller can pick a
    /// user-legible fallback reply.
    async fn chat(&self, history: &[Turn]) -> Result<String>;

    /// Check whether the backend is reachable and the model loaded.
    async fn is_available(&self) -> bool;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}
