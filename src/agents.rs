//! The finance assistant and the investment plan agent it delegates to.

use std::sync::Arc;

use crate::agent::{AgentBuilder, LlmAgent};
use crate::error::AgentError;
use crate::finance::finance_details_tool;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const INVESTMENT_PLAN_AGENT: &str = "investment_plan_agent";
pub const FINANCE_ASSISTANCE_AGENT: &str = "finance_assistance_agent";

pub const INVESTMENT_PLAN_DESCRIPTION: &str =
    "An investment plan assistant who can use Google Search to find latest information \
     and assist users in creating a savings plan";

pub const INVESTMENT_PLAN_INSTRUCTION: &str = r#"You are a friendly finance assistant.
You can help analyse user's monthly spending and find out ways to
reduce spending and increase savings to achieve their goal.

ALWAYS use the google_search tool when asked about:
- Stock prices (e.g., "Tesla stock price", "TSLA latest price")
- Market data, financial news, or company information
- ANY question containing words like "latest", "current", "today", "now", "recent"

After searching, provide the factual data from the search results with specific numbers and sources."#;

pub const FINANCE_ASSISTANCE_DESCRIPTION: &str =
    "A simple finance assistant that helps with user's finance goals.";

pub const FINANCE_ASSISTANCE_INSTRUCTION: &str = r#"You are a friendly finance assistant.
You can help answer user's generic questions on finance and help plan
their finance goals. Be more friendly and positive.

You have two tools to use to complete your task.
1. get_user_personal_finance_details - This tool will give you the user's current finance details
2. investment_plan_agent - This tool can perform Google Search to get any
latest information from websites and will be able to ask more details
from the user and plan their savings goal.

ALWAYS use the investment_plan_agent with google_search tool when asked about:
- Stock prices (e.g., "Tesla stock price", "TSLA latest price")
- Market data, financial news, or company information
- ANY question containing words like "latest", "current", "today", "now", "recent""#;

/// Searches the web (via Gemini grounding) and helps plan savings.
pub fn investment_plan_agent() -> Result<Arc<LlmAgent>, AgentError> {
    let agent = AgentBuilder::new(INVESTMENT_PLAN_AGENT)
        .model(DEFAULT_MODEL)
        .description(INVESTMENT_PLAN_DESCRIPTION)
        .instruction(INVESTMENT_PLAN_INSTRUCTION)
        .google_search()
        .build()?;
    Ok(Arc::new(agent))
}

/// General finance assistant; hands market questions to the investment
/// plan agent and reads the user's profile from the finance tool.
pub fn finance_assistance_agent() -> Result<Arc<LlmAgent>, AgentError> {
    let agent = AgentBuilder::new(FINANCE_ASSISTANCE_AGENT)
        .model(DEFAULT_MODEL)
        .description(FINANCE_ASSISTANCE_DESCRIPTION)
        .instruction(FINANCE_ASSISTANCE_INSTRUCTION)
        .agent_tool(investment_plan_agent()?)
        .tool(Arc::new(finance_details_tool()))
        .build()?;
    Ok(Arc::new(agent))
}

/// The agent a session starts with.
pub fn root_agent() -> Result<Arc<LlmAgent>, AgentError> {
    finance_assistance_agent()
}

/// Looks an agent up by name anywhere in the root agent's delegation tree.
pub fn find_agent(name: &str) -> Result<Option<Arc<LlmAgent>>, AgentError> {
    let mut stack = vec![root_agent()?];
    while let Some(agent) = stack.pop() {
        if agent.name == name {
            return Ok(Some(agent));
        }
        stack.extend(agent.sub_agents());
    }
    Ok(None)
}
