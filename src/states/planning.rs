use async_trait::async_trait;

use crate::states::AgentState;
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::{Citation, LlmResponse, Message, ToolCall};

pub struct PlanningState;

impl PlanningState {
    fn handle_tool_calls(&self, memory: &mut AgentMemory, mut calls: Vec<ToolCall>) -> Event {
        if calls.is_empty() {
            memory.log("Planning", "ANSWER_EMPTY", "model returned neither text nor tool calls");
            return Event::answer_empty();
        }

        // Gemini does not issue call ids; give every call a stable one.
        for (i, call) in calls.iter_mut().enumerate() {
            if call.id.is_none() {
                call.id = Some(format!("call_{}_{}", memory.step, i));
            }
        }

        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        let data = format!("tools={:?}", names);
        memory.log("Planning", "LLM_TOOL_CALL", &data);

        memory.messages.push(Message::Model { content: None, tool_calls: calls.clone() });
        memory.pending_tool_calls = calls;
        Event::llm_tool_call()
    }

    /// Fails the turn once usage (including delegated runs) passes the budget.
    fn check_budget(&self, memory: &mut AgentMemory) -> Option<Event> {
        let budget = memory.config.budget?;
        if !budget.is_exceeded(memory.usage) {
            return None;
        }
        memory.error = Some(format!(
            "Token budget exceeded: used {} tokens", memory.usage.total_tokens
        ));
        let data = format!("{:?}", memory.usage);
        memory.log("Planning", "BUDGET_EXCEEDED", &data);
        Some(Event::budget_exceeded())
    }

    fn handle_final_answer(&self, memory: &mut AgentMemory, content: String, citations: Vec<Citation>) -> Event {
        if content.trim().is_empty() {
            memory.log("Planning", "ANSWER_EMPTY", "blank answer");
            return Event::answer_empty();
        }

        memory.log("Planning", "LLM_FINAL_ANSWER", &content.chars().take(100).collect::<String>());
        memory.messages.push(Message::model_text(content.clone()));
        memory.final_answer = Some(content);
        memory.citations = citations;
        Event::llm_final_answer()
    }
}

#[async_trait]
impl AgentState for PlanningState {
    fn name(&self) -> &'static str { "Planning" }

    async fn handle(
        &self,
        memory: &mut AgentMemory,
        tools:  &ToolRegistry,
        ctx:    &ToolContext,
    ) -> Event {
        // 1. Guard: max steps
        if memory.step >= memory.config.max_steps {
            memory.error = Some(format!("Max steps {} exceeded", memory.config.max_steps));
            memory.log("Planning", "MAX_STEPS", &format!("step={}", memory.step));
            return Event::max_steps();
        }

        // 2. Sub-agents may have spent the budget since the last call
        if let Some(event) = self.check_budget(memory) {
            return event;
        }

        // 3. Increment step
        memory.step += 1;
        memory.log("Planning", "STEP_START", &format!("step={}/{}", memory.step, memory.config.max_steps));

        // 4. Resolve model
        let model = memory.config.resolve_model(&memory.agent_name, &memory.model).to_string();

        // 5. Call the model
        let response = match ctx.llm.call_async(memory, tools, &model).await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::error!(agent = %memory.agent_name, model = %model, error = %err, "LLM call failed");
                memory.error = Some(format!("LLM error: {}", err));
                memory.log("Planning", "LLM_ERROR", &err);
                return Event::fatal_error();
            }
        };

        // 6. Account usage against the budget
        if let Some(usage) = response.usage() {
            memory.usage.add(usage);
        }
        if let Some(event) = self.check_budget(memory) {
            return event;
        }

        match response {
            LlmResponse::ToolCalls { tools, .. } => self.handle_tool_calls(memory, tools),
            LlmResponse::FinalAnswer { content, citations, .. } => {
                self.handle_final_answer(memory, content, citations)
            }
        }
    }
}
