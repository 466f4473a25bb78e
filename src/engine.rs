use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::agent::LlmAgent;
use crate::error::AgentError;
use crate::events::Event;
use crate::llm::AsyncLlmCaller;
use crate::memory::AgentMemory;
use crate::states::{
    default_handlers, AgentState,
};
use crate::tools::{ToolContext, ToolRegistry};
use crate::trace::Trace;
use crate::transitions::{build_transition_table, TransitionTable};
use crate::types::{AgentConfig, AgentOutput, Message, State};

/// Drives one agent through one user turn.
pub struct AgentEngine {
    pub memory:  AgentMemory,
    pub agent:   Arc<LlmAgent>,
    tools:       ToolRegistry,
    ctx:         ToolContext,
    state:       State,
    transitions: TransitionTable,
    handlers:    HashMap<&'static str, Box<dyn AgentState>>,
}

impl AgentEngine {
    pub fn new(agent: Arc<LlmAgent>, llm: Arc<dyn AsyncLlmCaller>, task: impl Into<String>) -> Self {
        let memory = AgentMemory::new(agent.name.clone(), task)
            .with_system_prompt(agent.instruction.clone())
            .with_model(agent.model.clone());

        Self {
            tools: agent.registry(),
            ctx: ToolContext::new(llm, memory.config.clone()),
            memory,
            agent,
            state: State::idle(),
            transitions: build_transition_table(),
            handlers: default_handlers(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.ctx.config = config.clone();
        self.memory.config = config;
        self
    }

    /// Sets the delegation depth; `AgentTool` uses this for nested runs.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.ctx.depth = depth;
        self.memory.depth = depth;
        self
    }

    /// Streams `AgentOutput` progress events to the given channel.
    pub fn with_output(mut self, tx: UnboundedSender<AgentOutput>) -> Self {
        self.ctx.output_tx = Some(tx);
        self
    }

    /// Seeds the transcript with earlier turns of the same session.
    pub fn with_history(mut self, prior: Vec<Message>) -> Self {
        self.memory.prepend_messages(prior);
        self
    }

    /// Run the agent to completion.
    /// Returns Ok(final_answer) or Err(AgentError).
    pub async fn run(&mut self) -> Result<String, AgentError> {
        // Idle, three states per planning cycle, then the guarding Planning step.
        let safety_cap = self.memory.config.max_steps * 3 + 2;
        let mut iterations = 0;

        while !self.state.is_terminal() {
            iterations += 1;
            if iterations > safety_cap {
                return Err(AgentError::SafetyCapExceeded(iterations));
            }

            self.step().await?;
        }

        // Terminal handlers only record and report; their event is ignored.
        if let Some(handler) = self.handlers.get(self.state.as_str()) {
            handler.handle(&mut self.memory, &self.tools, &self.ctx).await;
        }

        if self.state == State::done() {
            Ok(self.memory.final_answer.clone()
                .unwrap_or_else(|| "[No answer produced]".to_string()))
        } else {
            Err(AgentError::AgentFailed(
                self.memory.error.clone()
                    .unwrap_or_else(|| "Unknown error".to_string())
            ))
        }
    }

    /// Executes a single state transition.
    pub async fn step(&mut self) -> Result<(), AgentError> {
        tracing::debug!(agent = %self.agent.name, state = %self.state, "agent step");

        let state_name = self.state.as_str();
        let handler = self.handlers.get(state_name)
            .ok_or_else(|| AgentError::NoHandlerForState(state_name.to_string()))?;

        if let Some(tx) = &self.ctx.output_tx {
            let _ = tx.send(AgentOutput::StateStarted {
                agent: self.agent.name.clone(),
                state: self.state.clone(),
            });
        }

        let event: Event = handler.handle(&mut self.memory, &self.tools, &self.ctx).await;

        let key = (self.state.clone(), event.clone());
        let next_state = self.transitions.get(&key)
            .cloned()
            .ok_or_else(|| AgentError::InvalidTransition {
                from:  self.state.clone(),
                event: event.clone(),
            })?;

        tracing::info!(
            agent = %self.agent.name,
            depth = self.memory.depth,
            from  = %self.state,
            event = %event,
            to    = %next_state,
            "transition"
        );

        self.state = next_state;
        Ok(())
    }

    /// Returns a reference to the full execution trace.
    pub fn trace(&self) -> &Trace {
        &self.memory.trace
    }

    /// Returns the current state (useful for inspection after run).
    pub fn current_state(&self) -> &State {
        &self.state
    }
}
