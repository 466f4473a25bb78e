use crate::budget::TokenUsage;
use crate::types::{AgentConfig, Citation, HistoryEntry, Message, ToolCall, ToolResult};
use crate::trace::{TraceEntry, Trace};
use chrono::Utc;

/// Everything one agent accumulates while it works through a single turn.
#[derive(Debug)]
pub struct AgentMemory {
    // ── Task definition ──────────────────────────────────
    /// Name of the agent this memory belongs to
    pub agent_name:         String,
    /// The user request (or delegated request) for this turn
    pub task:               String,
    /// The agent's instruction, sent as the system instruction
    pub system_prompt:      String,
    /// The model the agent declares; `AgentConfig` may override it
    pub model:              String,
    /// Delegation depth: 0 for the root agent
    pub depth:              usize,

    // ── Execution state ──────────────────────────────────
    /// Current step number (incremented at start of each Planning cycle)
    pub step:               usize,

    // ── Tool call lifecycle ──────────────────────────────
    /// Set by PlanningState, consumed by ActingState
    pub pending_tool_calls: Vec<ToolCall>,
    /// Set by ActingState, consumed by ObservingState
    pub tool_results:       Vec<ToolResult>,

    // ── Conversation ─────────────────────────────────────
    /// Prior session turns followed by this turn's exchanges
    pub messages:           Vec<Message>,
    /// Ordered list of completed tool calls and their observations
    pub history:            Vec<HistoryEntry>,
    /// Set when the model produces a final answer
    pub final_answer:       Option<String>,
    /// Grounding sources attached to the final answer
    pub citations:          Vec<Citation>,
    /// Set when the agent encounters an unrecoverable error
    pub error:              Option<String>,

    // ── Configuration / accounting ───────────────────────
    pub config:             AgentConfig,
    pub usage:              TokenUsage,

    // ── Observability ────────────────────────────────────
    /// Every handler decision recorded here
    pub trace:              Trace,
}

impl AgentMemory {
    pub fn new(agent_name: impl Into<String>, task: impl Into<String>) -> Self {
        let task = task.into();
        Self {
            agent_name:         agent_name.into(),
            messages:           vec![Message::user(task.clone())],
            task,
            system_prompt:      String::new(),
            model:              String::new(),
            depth:              0,
            step:               0,
            pending_tool_calls: Vec::new(),
            tool_results:       Vec::new(),
            history:            Vec::new(),
            final_answer:       None,
            citations:          Vec::new(),
            error:              None,
            config:             AgentConfig::default(),
            usage:              TokenUsage::default(),
            trace:              Trace::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Places earlier turns of a session ahead of the current request.
    pub fn prepend_messages(&mut self, prior: Vec<Message>) {
        let mut messages = prior;
        messages.append(&mut self.messages);
        self.messages = messages;
    }

    /// Records an event into the trace log. Called by all state handlers.
    pub fn log(&mut self, state: &str, event: &str, data: &str) {
        tracing::debug!(agent = %self.agent_name, state, event, data, step = self.step, "agent trace");
        self.trace.record(TraceEntry {
            agent:     self.agent_name.clone(),
            step:      self.step,
            state:     state.to_string(),
            event:     event.to_string(),
            data:      data.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_messages_come_before_the_current_request() {
        let mut memory = AgentMemory::new("a", "second question");
        memory.prepend_messages(vec![
            Message::user("first question"),
            Message::model_text("first answer"),
        ]);

        assert_eq!(memory.messages.len(), 3);
        assert_eq!(memory.messages[0], Message::user("first question"));
        assert_eq!(memory.messages[2], Message::user("second question"));
    }
}
