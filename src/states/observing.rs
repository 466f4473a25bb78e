use async_trait::async_trait;

use crate::states::AgentState;
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::{HistoryEntry, Message, ToolCall};

pub struct ObservingState;

#[async_trait]
impl AgentState for ObservingState {
    fn name(&self) -> &'static str { "Observing" }

    async fn handle(
        &self,
        memory: &mut AgentMemory,
        _tools: &ToolRegistry,
        _ctx:   &ToolContext,
    ) -> Event {
        let results = std::mem::take(&mut memory.tool_results);

        for res in &results {
            memory.history.push(HistoryEntry {
                step: memory.step,
                tool: ToolCall {
                    name: res.tool_name.clone(),
                    args: res.tool_args.clone(),
                    id:   res.id.clone(),
                },
                observation: res.output.clone(),
                success:     res.success,
            });
        }

        let data = format!("step={} committed={} history={}", memory.step, results.len(), memory.history.len());
        memory.log("Observing", "HISTORY_COMMIT", &data);

        // One tool message answers the model message that requested the calls.
        if !results.is_empty() {
            memory.messages.push(Message::Tool { results });
        }

        Event::r#continue()
    }
}
