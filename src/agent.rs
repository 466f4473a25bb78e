use std::collections::HashSet;
use std::sync::Arc;

use crate::error::AgentError;
use crate::tools::{AgentTool, FunctionTool, GoogleSearchTool, Tool, ToolFn, ToolKind, ToolRegistry};

/// A declarative agent: who it is, which model drives it, what it is told
/// and which tools it may call. Immutable once built.
pub struct LlmAgent {
    pub name:        String,
    pub model:       String,
    pub description: String,
    pub instruction: String,
    pub tools:       Vec<Arc<dyn Tool>>,
}

impl LlmAgent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// Tool names in declaration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn registry(&self) -> ToolRegistry {
        ToolRegistry::from_tools(&self.tools)
    }

    /// Agents this one delegates to through `AgentTool`.
    pub fn sub_agents(&self) -> Vec<Arc<LlmAgent>> {
        self.tools.iter().filter_map(|t| t.delegate().cloned()).collect()
    }
}

impl std::fmt::Debug for LlmAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAgent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("description", &self.description)
            .field("tools", &self.tool_names())
            .finish()
    }
}

pub struct AgentBuilder {
    name:        String,
    model:       String,
    description: String,
    instruction: String,
    tools:       Vec<Arc<dyn Tool>>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:        name.into(),
            model:       String::new(),
            description: String::new(),
            instruction: String::new(),
            tools:       Vec::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into(); self
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.description = d.into(); self
    }

    pub fn instruction(mut self, i: impl Into<String>) -> Self {
        self.instruction = i.into(); self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool); self
    }

    pub fn function_tool(
        self,
        name:        impl Into<String>,
        description: impl Into<String>,
        schema:      serde_json::Value,
        func:        ToolFn,
    ) -> Self {
        self.tool(Arc::new(FunctionTool::new(name, description, schema, func)))
    }

    /// Expose another agent as a callable tool.
    pub fn agent_tool(self, agent: Arc<LlmAgent>) -> Self {
        self.tool(Arc::new(AgentTool::new(agent)))
    }

    /// Enable Gemini's built-in Google Search grounding.
    pub fn google_search(self) -> Self {
        self.tool(Arc::new(GoogleSearchTool))
    }

    pub fn build(self) -> Result<LlmAgent, AgentError> {
        if !is_identifier(&self.name) {
            return Err(AgentError::BuildError(format!(
                "agent name '{}' must be a non-empty identifier", self.name
            )));
        }
        if self.model.trim().is_empty() {
            return Err(AgentError::BuildError(format!("agent '{}' has no model", self.name)));
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name().to_string()) {
                return Err(AgentError::BuildError(format!(
                    "agent '{}' declares tool '{}' twice", self.name, tool.name()
                )));
            }
        }

        // Gemini rejects built-in search combined with function declarations.
        let builtin = self.tools.iter().filter(|t| t.kind() == ToolKind::Builtin).count();
        if builtin > 0 && builtin < self.tools.len() {
            return Err(AgentError::BuildError(format!(
                "agent '{}' mixes built-in tools with function tools; wrap the built-in in its own agent",
                self.name
            )));
        }

        Ok(LlmAgent {
            name:        self.name,
            model:       self.model,
            description: self.description,
            instruction: self.instruction,
            tools:       self.tools,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> ToolFn {
        Box::new(|_| Ok(String::new()))
    }

    #[test]
    fn builds_with_tools_in_order() {
        let agent = AgentBuilder::new("helper")
            .model("gemini-2.5-flash")
            .function_tool("b", "b", json!({}), noop())
            .function_tool("a", "a", json!({}), noop())
            .build()
            .unwrap();
        assert_eq!(agent.tool_names(), vec!["b", "a"]);
    }

    #[test]
    fn rejects_invalid_names_and_missing_model() {
        assert!(AgentBuilder::new("").model("m").build().is_err());
        assert!(AgentBuilder::new("has space").model("m").build().is_err());
        assert!(AgentBuilder::new("1st").model("m").build().is_err());
        assert!(AgentBuilder::new("ok_name").build().is_err());
        assert!(AgentBuilder::new("_ok2").model("m").build().is_ok());
    }

    #[test]
    fn rejects_duplicate_tools() {
        let result = AgentBuilder::new("dup")
            .model("m")
            .function_tool("x", "x", json!({}), noop())
            .function_tool("x", "x", json!({}), noop())
            .build();
        assert!(matches!(result, Err(AgentError::BuildError(_))));
    }

    #[test]
    fn rejects_search_mixed_with_functions() {
        let result = AgentBuilder::new("mixed")
            .model("m")
            .google_search()
            .function_tool("x", "x", json!({}), noop())
            .build();
        assert!(matches!(result, Err(AgentError::BuildError(_))));

        let search_only = AgentBuilder::new("search_only").model("m").google_search().build();
        assert!(search_only.is_ok());
    }

    #[test]
    fn agent_tool_takes_the_wrapped_agents_identity() {
        let inner = Arc::new(
            AgentBuilder::new("inner").model("m").description("does inner things").build().unwrap(),
        );
        let outer = AgentBuilder::new("outer").model("m").agent_tool(inner).build().unwrap();
        let schema = outer.tools[0].schema();
        assert_eq!(schema.name, "inner");
        assert_eq!(schema.description, "does inner things");
        assert_eq!(schema.input_schema["required"], json!(["request"]));
        assert_eq!(outer.sub_agents()[0].name, "inner");
    }
}
