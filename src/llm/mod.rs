use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::LlmResponse;
use async_trait::async_trait;

mod gemini;
mod mock;
mod retry;

pub use gemini::{GeminiCaller, DEFAULT_API_BASE};
pub use mock::{MockCall, MockLlmCaller};
pub use retry::RetryingLlmCaller;

/// The single interface between the state machine and any LLM provider.
///
/// # Contract
/// - Must be Send + Sync (shared as `Arc<dyn AsyncLlmCaller>` across
///   an agent and every sub-agent it delegates to)
/// - Returns Ok(LlmResponse) on any valid model interaction
/// - Returns Err(String) ONLY for unrecoverable failures:
///   - Network failure after retries exhausted
///   - Authentication failure
///   - Response unparseable as LlmResponse
/// - MUST declare the function tools from `tools.function_schemas()` and
///   enable provider built-ins such as search when the registry has them
/// - MUST build the conversation from `memory.messages` and send
///   `memory.system_prompt` as the system instruction
#[async_trait]
pub trait AsyncLlmCaller: Send + Sync {
    async fn call_async(
        &self,
        memory: &AgentMemory,
        tools:  &ToolRegistry,
        model:  &str,
    ) -> Result<LlmResponse, String>;
}
