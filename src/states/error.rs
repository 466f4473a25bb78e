use async_trait::async_trait;

use crate::states::{emit, AgentState};
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::AgentOutput;

pub struct ErrorState;

#[async_trait]
impl AgentState for ErrorState {
    fn name(&self) -> &'static str { "Error" }

    async fn handle(
        &self,
        memory: &mut AgentMemory,
        _tools: &ToolRegistry,
        ctx:    &ToolContext,
    ) -> Event {
        // Clone to avoid holding an immutable borrow while mutably borrowing for log()
        let error_msg = memory.error.clone()
            .unwrap_or_else(|| "Unknown error".to_string());
        memory.log("Error", "AGENT_FAILED", &error_msg);
        tracing::warn!(agent = %memory.agent_name, error = %error_msg, "agent run failed");

        emit(ctx, AgentOutput::Error {
            agent:   memory.agent_name.clone(),
            message: error_msg,
        });
        Event::start()  // Never looked up: Error is terminal
    }
}
