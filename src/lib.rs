pub mod types;
pub mod memory;
pub mod events;
pub mod transitions;
pub mod tools;
pub mod engine;
pub mod trace;
pub mod error;
pub mod agent;
pub mod agents;
pub mod finance;
pub mod states;
pub mod llm;
pub mod budget;
pub mod session;
pub mod config;

// Convenience re-exports at crate root
pub use agent::{AgentBuilder, LlmAgent};
pub use agents::{finance_assistance_agent, investment_plan_agent, root_agent};
pub use engine::AgentEngine;
pub use memory::AgentMemory;
pub use types::{State, LlmResponse, ToolCall, HistoryEntry, AgentConfig, Message, Citation};
pub use events::Event;
pub use tools::{Tool, ToolKind, ToolContext, ToolRegistry, ToolFn, FunctionTool, AgentTool, GoogleSearchTool};
pub use llm::{AsyncLlmCaller, GeminiCaller, RetryingLlmCaller};
pub use finance::{get_user_personal_finance_details, FinanceDetails, Expenses};
pub use session::{Runner, Session, SessionStore};
pub use config::Settings;
pub use trace::{TraceEntry, Trace};
pub use error::AgentError;
