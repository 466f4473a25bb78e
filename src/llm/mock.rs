use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::AsyncLlmCaller;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::LlmResponse;

/// One recorded invocation of the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub model:         String,
    pub agent:         String,
    pub task:          String,
    pub message_count: usize,
    pub tool_names:    Vec<String>,
}

/// Replays scripted responses in order. Shared by a whole delegation tree,
/// so the script interleaves parent and sub-agent turns.
pub struct MockLlmCaller {
    responses: Mutex<Vec<LlmResponse>>,
    call_log:  Mutex<Vec<MockCall>>,
}

impl MockLlmCaller {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_log:  Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of times call_async() was invoked
    pub fn call_count(&self) -> usize {
        self.call_log.lock().map(|log| log.len()).unwrap_or(0)
    }

    /// Returns a copy of every recorded call
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Returns the model string passed to the Nth call (0-indexed)
    pub fn model_for_call(&self, n: usize) -> Option<String> {
        self.calls().get(n).map(|c| c.model.clone())
    }
}

#[async_trait]
impl AsyncLlmCaller for MockLlmCaller {
    async fn call_async(
        &self,
        memory: &AgentMemory,
        tools:  &ToolRegistry,
        model:  &str,
    ) -> Result<LlmResponse, String> {
        self.call_log.lock()
            .map_err(|_| "MockLlmCaller: call log poisoned".to_string())?
            .push(MockCall {
                model:         model.to_string(),
                agent:         memory.agent_name.clone(),
                task:          memory.task.clone(),
                message_count: memory.messages.len(),
                tool_names:    tools.names().into_iter().map(str::to_string).collect(),
            });

        let mut responses = self.responses.lock()
            .map_err(|_| "MockLlmCaller: responses poisoned".to_string())?;
        if responses.is_empty() {
            return Err("MockLlmCaller: no more programmed responses".to_string());
        }
        Ok(responses.remove(0))
    }
}
