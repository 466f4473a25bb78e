use async_trait::async_trait;

use crate::states::AgentState;
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::{ToolContext, ToolRegistry};

pub struct IdleState;

#[async_trait]
impl AgentState for IdleState {
    fn name(&self) -> &'static str { "Idle" }

    async fn handle(
        &self,
        memory: &mut AgentMemory,
        tools:  &ToolRegistry,
        _ctx:   &ToolContext,
    ) -> Event {
        let data = format!(
            "task='{}' tools={:?} depth={} max_steps={}",
            memory.task, tools.names(), memory.depth, memory.config.max_steps
        );
        memory.log("Idle", "AGENT_STARTED", &data);
        Event::start()
    }
}
