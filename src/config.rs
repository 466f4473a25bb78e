use std::path::PathBuf;

use crate::budget::TokenBudget;
use crate::error::AgentError;
use crate::llm::DEFAULT_API_BASE;
use crate::types::AgentConfig;

/// Process-level settings, read from the environment (and `.env`).
///
/// | Variable              | Meaning                                        |
/// |-----------------------|------------------------------------------------|
/// | `GOOGLE_API_KEY`      | Gemini API key (required for live calls)       |
/// | `GEMINI_API_BASE`     | API base URL                                   |
/// | `FINAGENT_MODEL`      | Model used by every agent, overriding theirs   |
/// | `FINAGENT_MAX_STEPS`  | Planning cycles allowed per turn               |
/// | `FINAGENT_MAX_RETRIES`| Retries for transient model errors             |
/// | `FINAGENT_MAX_TOKENS` | Token budget per turn                          |
/// | `FINAGENT_DB`         | SQLite file for sessions; in-memory if unset   |
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key:        Option<String>,
    pub api_base:       String,
    pub model_override: Option<String>,
    pub max_steps:      usize,
    pub max_retries:    u32,
    pub max_tokens:     Option<u32>,
    pub db_path:        Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key:        None,
            api_base:       DEFAULT_API_BASE.to_string(),
            model_override: None,
            max_steps:      AgentConfig::default().max_steps,
            max_retries:    3,
            max_tokens:     None,
            db_path:        None,
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, AgentError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(AgentError::ConfigError(format!("failed to read .env: {}", e))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AgentError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            api_key:        get("GOOGLE_API_KEY"),
            api_base:       get("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            model_override: get("FINAGENT_MODEL"),
            max_steps:      parse_var("FINAGENT_MAX_STEPS", get("FINAGENT_MAX_STEPS"))?
                                .unwrap_or(defaults.max_steps),
            max_retries:    parse_var("FINAGENT_MAX_RETRIES", get("FINAGENT_MAX_RETRIES"))?
                                .unwrap_or(defaults.max_retries),
            max_tokens:     parse_var("FINAGENT_MAX_TOKENS", get("FINAGENT_MAX_TOKENS"))?,
            db_path:        get("FINAGENT_DB").map(PathBuf::from),
        })
    }

    pub fn require_api_key(&self) -> Result<&str, AgentError> {
        self.api_key.as_deref().ok_or_else(|| {
            AgentError::ConfigError("GOOGLE_API_KEY is not set (export it or add it to .env)".to_string())
        })
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_steps:      self.max_steps,
            model_override: self.model_override.clone(),
            budget:         self.max_tokens.map(TokenBudget::new),
            ..AgentConfig::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, AgentError>
where
    T::Err: std::fmt::Display,
{
    raw.map(|v| {
        v.parse::<T>()
            .map_err(|e| AgentError::ConfigError(format!("{}='{}' is invalid: {}", key, v, e)))
    })
    .transpose()
}
