use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::budget::{TokenBudget, TokenUsage};

/// A named state in the agent's state machine.
///
/// States are identified by their string name. The engine ships with
/// six well-known constructors (`State::idle()`, `State::planning()`, …).
///
/// ```
/// use finagent::State;
/// assert!(State::done().is_terminal());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State(pub String);

impl State {
    /// Create a new state with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the string name of this state.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for `"Done"` and `"Error"`.
    pub fn is_terminal(&self) -> bool {
        self.0 == "Done" || self.0 == "Error"
    }

    // ── Well-known built-in state constructors ──────────────────────────
    pub fn idle()      -> Self { Self::new("Idle") }
    pub fn planning()  -> Self { Self::new("Planning") }
    pub fn acting()    -> Self { Self::new("Acting") }
    pub fn observing() -> Self { Self::new("Observing") }
    pub fn done()      -> Self { Self::new("Done") }
    pub fn error()     -> Self { Self::new("Error") }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: HashMap<String, serde_json::Value>,
    pub id:   Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), args: HashMap::new(), id: None }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// Result of a single tool execution within one Acting step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name:  String,
    pub tool_args:  HashMap<String, serde_json::Value>,
    pub id:         Option<String>,
    pub output:     String,      // "SUCCESS: ..." or "ERROR: ..."
    pub success:    bool,
    pub latency_ms: u64,
}

impl ToolResult {
    pub fn success(call: &ToolCall, output: String, latency_ms: u64) -> Self {
        Self {
            tool_name: call.name.clone(),
            tool_args: call.args.clone(),
            id:        call.id.clone(),
            output:    format!("SUCCESS: {}", output),
            success:   true,
            latency_ms,
        }
    }

    pub fn failure(call: &ToolCall, error: String, latency_ms: u64) -> Self {
        Self {
            tool_name: call.name.clone(),
            tool_args: call.args.clone(),
            id:        call.id.clone(),
            output:    format!("ERROR: {}", error),
            success:   false,
            latency_ms,
        }
    }
}

/// A completed tool invocation stored in history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step:        usize,
    pub tool:        ToolCall,
    pub observation: String,
    pub success:     bool,
}

/// A web source the model grounded its answer on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: Option<String>,
    pub uri:   String,
}

impl std::fmt::Display for Citation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.title {
            Some(title) => write!(f, "{} ({})", title, self.uri),
            None        => write!(f, "{}", self.uri),
        }
    }
}

/// One entry of the conversation transcript sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Model {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content:    Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        results: Vec<ToolResult>,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn model_text(content: impl Into<String>) -> Self {
        Self::Model { content: Some(content.into()), tool_calls: Vec::new() }
    }
}

/// What the model can return. Always one of these two variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmResponse {
    /// The model wants to invoke one or more function tools
    ToolCalls {
        tools: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
    /// The model produced a final answer for this turn
    FinalAnswer {
        content:   String,
        citations: Vec<Citation>,
        usage:     Option<TokenUsage>,
    },
}

impl LlmResponse {
    /// Shorthand for a single tool call.
    pub fn tool_call(tool: ToolCall) -> Self {
        Self::ToolCalls { tools: vec![tool], usage: None }
    }

    /// Shorthand for an ungrounded answer.
    pub fn answer(content: impl Into<String>) -> Self {
        Self::FinalAnswer { content: content.into(), citations: Vec::new(), usage: None }
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            Self::ToolCalls { usage, .. } | Self::FinalAnswer { usage, .. } => *usage,
        }
    }
}

/// Progress events emitted by the engine while a turn runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentOutput {
    /// A new state has started execution
    StateStarted { agent: String, state: State },
    /// A tool call is being initiated
    ToolCallStarted {
        agent: String,
        name:  String,
        args:  HashMap<String, serde_json::Value>,
    },
    /// A tool call has completed
    ToolCallFinished {
        agent:   String,
        name:    String,
        result:  String,
        success: bool,
    },
    /// The agent has produced a final answer
    FinalAnswer { agent: String, content: String },
    /// An error terminated the run
    Error { agent: String, message: String },
}

/// Runtime knobs shared by every agent in a delegation tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on number of planning cycles per turn
    pub max_steps: usize,

    /// Run multiple tool calls from one model turn concurrently
    pub parallel_tools: bool,

    /// How deep `AgentTool` delegation may nest
    pub max_delegation_depth: usize,

    /// Optional token ceiling for a single turn
    pub budget: Option<TokenBudget>,

    /// Replaces every agent's model when set.
    pub model_override: Option<String>,

    /// Per-agent model selection: agent name → model name.
    ///
    /// ```
    /// # use finagent::AgentConfig;
    /// let _config = AgentConfig {
    ///     models: [("investment_plan_agent".to_string(), "gemini-2.5-pro".to_string())].into(),
    ///     ..Default::default()
    /// };
    /// ```
    pub models: HashMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps:            15,
            parallel_tools:       true,
            max_delegation_depth: 4,
            budget:               None,
            model_override:       None,
            models:               HashMap::new(),
        }
    }
}

impl AgentConfig {
    /// Resolve the model for an agent.
    ///
    /// Priority:
    ///   1. `model_override`
    ///   2. `models[agent_name]`
    ///   3. the agent's own declared model
    pub fn resolve_model<'a>(&'a self, agent_name: &str, declared: &'a str) -> &'a str {
        self.model_override
            .as_deref()
            .or_else(|| self.models.get(agent_name).map(|s| s.as_str()))
            .unwrap_or(declared)
    }
}
