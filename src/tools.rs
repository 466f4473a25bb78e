use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;

use crate::agent::LlmAgent;
use crate::budget::TokenUsage;
use crate::engine::AgentEngine;
use crate::llm::AsyncLlmCaller;
use crate::trace::TraceEntry;
use crate::types::{AgentConfig, AgentOutput};

/// A tool function: takes JSON args, returns string result or error string.
pub type ToolFn = Box<dyn Fn(&HashMap<String, Value>) -> Result<String, String> + Send + Sync>;

/// Tool schema sent to the model as a function declaration.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSchema {
    pub name:         String,
    pub description:  String,
    pub input_schema: Value,   // JSON Schema object
}

/// Where a tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Declared to the model, executed locally by the engine
    Function,
    /// Executed by the model provider itself (e.g. Google Search grounding)
    Builtin,
}

/// Usage and trace of nested agent runs, handed back to the step that
/// started them.
#[derive(Debug, Default)]
pub struct Delegated {
    pub usage: TokenUsage,
    pub trace: Vec<TraceEntry>,
}

/// What a tool sees of the run that invoked it.
#[derive(Clone)]
pub struct ToolContext {
    pub llm:       Arc<dyn AsyncLlmCaller>,
    pub config:    AgentConfig,
    pub depth:     usize,
    pub output_tx: Option<UnboundedSender<AgentOutput>>,
    /// Tokens the invoking agent has used so far this turn.
    pub spent:     TokenUsage,
    delegated:     Arc<Mutex<Delegated>>,
}

impl ToolContext {
    pub fn new(llm: Arc<dyn AsyncLlmCaller>, config: AgentConfig) -> Self {
        Self {
            llm,
            config,
            depth:     0,
            output_tx: None,
            spent:     TokenUsage::default(),
            delegated: Arc::default(),
        }
    }

    /// A copy for one Acting step: charged against `spent`, with an empty
    /// delegation record of its own.
    pub fn for_step(&self, spent: TokenUsage) -> Self {
        Self {
            spent,
            delegated: Arc::default(),
            ..self.clone()
        }
    }

    pub fn record_delegation(&self, usage: TokenUsage, trace: Vec<TraceEntry>) {
        match self.delegated.lock() {
            Ok(mut d) => {
                d.usage.add(usage);
                d.trace.extend(trace);
            }
            Err(_) => tracing::error!("delegation record poisoned; sub-agent usage lost"),
        }
    }

    /// Drains what nested runs recorded through this context.
    pub fn take_delegated(&self) -> Delegated {
        self.delegated.lock()
            .map(|mut d| std::mem::take(&mut *d))
            .unwrap_or_default()
    }
}

/// Anything the model may invoke during a turn.
///
/// `call` never panics: failures come back as `Err(String)` and become
/// `ERROR:` observations the model can react to.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    /// JSON Schema for the call arguments.
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    /// The agent behind this tool, if it delegates to one.
    fn delegate(&self) -> Option<&Arc<LlmAgent>> {
        None
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name:         self.name().to_string(),
            description:  self.description().to_string(),
            input_schema: self.parameters(),
        }
    }

    async fn call(&self, args: &HashMap<String, Value>, ctx: &ToolContext) -> Result<String, String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// FunctionTool
// ─────────────────────────────────────────────────────────────────────────────

/// A plain Rust closure exposed to the model.
pub struct FunctionTool {
    name:        String,
    description: String,
    parameters:  Value,
    func:        ToolFn,
}

impl FunctionTool {
    pub fn new(
        name:        impl Into<String>,
        description: impl Into<String>,
        parameters:  Value,
        func:        ToolFn,
    ) -> Self {
        Self {
            name:        name.into(),
            description: description.into(),
            parameters,
            func,
        }
    }

    /// Wraps a closure returning any serializable value; the value is
    /// handed to the model as JSON.
    pub fn json<T, F>(
        name:        impl Into<String>,
        description: impl Into<String>,
        parameters:  Value,
        func:        F,
    ) -> Self
    where
        T: serde::Serialize,
        F: Fn(&HashMap<String, Value>) -> Result<T, String> + Send + Sync + 'static,
    {
        Self::new(name, description, parameters, Box::new(move |args| {
            let value = func(args)?;
            serde_json::to_string(&value).map_err(|e| format!("Failed to serialize tool output: {}", e))
        }))
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str { &self.name }

    fn description(&self) -> &str { &self.description }

    fn parameters(&self) -> Value { self.parameters.clone() }

    async fn call(&self, args: &HashMap<String, Value>, _ctx: &ToolContext) -> Result<String, String> {
        (self.func)(args)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentTool
// ─────────────────────────────────────────────────────────────────────────────

/// Exposes another agent as a tool. Calling it runs the wrapped agent to
/// completion on the given request and returns its answer.
pub struct AgentTool {
    agent: Arc<LlmAgent>,
}

impl AgentTool {
    pub fn new(agent: Arc<LlmAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str { &self.agent.name }

    fn description(&self) -> &str { &self.agent.description }

    fn delegate(&self) -> Option<&Arc<LlmAgent>> { Some(&self.agent) }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": format!("The request to hand to {}", self.agent.name)
                }
            },
            "required": ["request"]
        })
    }

    async fn call(&self, args: &HashMap<String, Value>, ctx: &ToolContext) -> Result<String, String> {
        let request = args.get("request")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Agent tool '{}' requires a non-empty 'request' argument", self.agent.name))?;

        if ctx.depth >= ctx.config.max_delegation_depth {
            return Err(format!(
                "Delegation to '{}' refused: depth {} reaches the limit of {}",
                self.agent.name, ctx.depth + 1, ctx.config.max_delegation_depth
            ));
        }

        tracing::info!(agent = %self.agent.name, depth = ctx.depth + 1, "delegating to sub-agent");

        // The sub-agent spends from what is left of the turn's budget.
        let mut config = ctx.config.clone();
        config.budget = config.budget.map(|b| b.remaining(ctx.spent));

        let mut engine = AgentEngine::new(Arc::clone(&self.agent), Arc::clone(&ctx.llm), request)
            .with_config(config)
            .with_depth(ctx.depth + 1);
        if let Some(tx) = &ctx.output_tx {
            engine = engine.with_output(tx.clone());
        }

        let outcome = engine.run().await;
        let trace = std::mem::take(&mut engine.memory.trace).into_entries();
        ctx.record_delegation(engine.memory.usage, trace);

        let answer = outcome.map_err(|e| e.to_string())?;
        let citations = &engine.memory.citations;
        if citations.is_empty() {
            return Ok(answer);
        }

        let sources: Vec<String> = citations.iter().map(|c| format!("- {}", c)).collect();
        Ok(format!("{}\n\nSources:\n{}", answer, sources.join("\n")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GoogleSearchTool
// ─────────────────────────────────────────────────────────────────────────────

pub const GOOGLE_SEARCH: &str = "google_search";

/// Gemini's built-in Google Search grounding. The provider runs the search,
/// so there is nothing to execute locally.
pub struct GoogleSearchTool;

#[async_trait]
impl Tool for GoogleSearchTool {
    fn name(&self) -> &str { GOOGLE_SEARCH }

    fn description(&self) -> &str {
        "Searches Google for up-to-date information; executed by the model provider"
    }

    fn kind(&self) -> ToolKind { ToolKind::Builtin }

    async fn call(&self, _args: &HashMap<String, Value>, _ctx: &ToolContext) -> Result<String, String> {
        Err("google_search is executed by the model provider and cannot be called locally".to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ToolRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// The tools of one agent, in declaration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn from_tools(tools: &[Arc<dyn Tool>]) -> Self {
        Self { tools: tools.to_vec() }
    }

    /// Register a tool. Lookups return the first tool with a matching name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Execute a named tool with given arguments.
    /// Returns Ok(result_string) or Err(error_string).
    pub async fn execute(
        &self,
        name: &str,
        args: &HashMap<String, Value>,
        ctx:  &ToolContext,
    ) -> Result<String, String> {
        match self.get(name) {
            Some(tool) => tool.call(args, ctx).await,
            None       => Err(format!("Tool '{}' not found in registry", name)),
        }
    }

    /// Returns true if a tool with this name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Schemas of the function tools, used for the model's function declarations.
    pub fn function_schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter()
            .filter(|t| t.kind() == ToolKind::Function)
            .map(|t| t.schema())
            .collect()
    }

    pub fn has_builtin_search(&self) -> bool {
        self.tools.iter().any(|t| t.kind() == ToolKind::Builtin && t.name() == GOOGLE_SEARCH)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Returns the count of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
