use async_trait::async_trait;

use crate::states::{emit, AgentState};
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::AgentOutput;

pub struct DoneState;

#[async_trait]
impl AgentState for DoneState {
    fn name(&self) -> &'static str { "Done" }

    async fn handle(
        &self,
        memory: &mut AgentMemory,
        _tools: &ToolRegistry,
        ctx:    &ToolContext,
    ) -> Event {
        let answer = memory.final_answer.clone().unwrap_or_else(|| "[No answer]".to_string());
        let truncated: String = answer.chars().take(100).collect();
        memory.log("Done", "TASK_COMPLETE", &truncated);

        emit(ctx, AgentOutput::FinalAnswer {
            agent:   memory.agent_name.clone(),
            content: answer,
        });
        Event::start()  // Never looked up: Done is terminal
    }
}
