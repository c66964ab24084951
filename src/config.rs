//! Process configuration from environment variables

use crate::llm::LlmConfig;
use crate::runtime::RunnerConfig;
use crate::session::RegistryConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub app_name: String,
    pub user_id: String,
    /// Agent catalog file; no agents are served without one
    pub agents_config: Option<PathBuf>,
    pub sessions: RegistryConfig,
    pub runner: RunnerConfig,
    /// Expose unparseable model output in logs and error responses
    pub debug_ai_json: bool,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RegistryConfig::default();

        Self {
            port: parsed(&lookup, "PORT").unwrap_or(3000),
            app_name: lookup("APP_NAME").unwrap_or_else(|| "agent-turns".to_string()),
            user_id: lookup("DEFAULT_USER_ID").unwrap_or_else(|| "user-1".to_string()),
            agents_config: lookup("AGENTS_CONFIG")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            sessions: RegistryConfig {
                ttl: parsed(&lookup, "SESSION_TTL_SECS").map_or(defaults.ttl, Duration::from_secs),
                capacity: parsed(&lookup, "MAX_SESSIONS").unwrap_or(defaults.capacity),
            },
            runner: RunnerConfig {
                max_tool_rounds: parsed(&lookup, "MAX_TOOL_ROUNDS")
                    .unwrap_or(RunnerConfig::default().max_tool_rounds),
                ..RunnerConfig::default()
            },
            debug_ai_json: lookup("DEBUG_AI_JSON").as_deref() == Some("1"),
            llm: LlmConfig {
                gemini_api_key: lookup("GEMINI_API_KEY"),
                gateway: lookup("LLM_GATEWAY"),
                default_model: lookup("DEFAULT_MODEL"),
            },
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.app_name, "agent-turns");
        assert_eq!(config.user_id, "user-1");
        assert!(config.agents_config.is_none());
        assert_eq!(config.sessions.ttl, Duration::from_secs(3600));
        assert_eq!(config.sessions.capacity, 10_000);
        assert_eq!(config.runner.max_tool_rounds, 8);
        assert!(!config.debug_ai_json);
        assert!(config.llm.gemini_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("AGENTS_CONFIG", "/etc/agents.json"),
            ("SESSION_TTL_SECS", "60"),
            ("MAX_SESSIONS", "5"),
            ("MAX_TOOL_ROUNDS", "3"),
            ("DEBUG_AI_JSON", "1"),
            ("LLM_GATEWAY", "http://gateway"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.agents_config, Some(PathBuf::from("/etc/agents.json")));
        assert_eq!(config.sessions.ttl, Duration::from_secs(60));
        assert_eq!(config.sessions.capacity, 5);
        assert_eq!(config.runner.max_tool_rounds, 3);
        assert!(config.debug_ai_json);
        assert_eq!(config.llm.gateway.as_deref(), Some("http://gateway"));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config(&[("PORT", "eighty"), ("DEBUG_AI_JSON", "true")]);
        assert_eq!(config.port, 3000);
        assert!(!config.debug_ai_json);
    }
}
