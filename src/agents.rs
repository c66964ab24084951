//! Agent definitions and the catalog they are loaded from
//!
//! An agent is a name, an instruction block, the tools it may call and,
//! optionally, a preferred tool whose result wins over the model's prose.

use crate::tools::{HttpTool, HttpToolSpec, ToolRegistry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// One configured agent
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    /// Model id; the registry default when absent
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Tool whose recorded result is returned verbatim when present
    #[serde(default)]
    pub preferred_tool: Option<String>,
    /// Accept structured JSON prompts and render them to text
    #[serde(default)]
    pub structured_prompt: bool,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            model: None,
            tools: vec![],
            preferred_tool: None,
            structured_prompt: false,
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| (*t).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_preferred_tool(mut self, tool: impl Into<String>) -> Self {
        self.preferred_tool = Some(tool.into());
        self
    }

    #[must_use]
    pub fn with_structured_prompt(mut self) -> Self {
        self.structured_prompt = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read agent catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid agent catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("agent '{agent}' references unknown tool '{tool}'")]
    UnknownTool { agent: String, tool: String },
    #[error("agent '{0}' is defined more than once")]
    DuplicateAgent(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    agents: Vec<AgentDefinition>,
    #[serde(default)]
    tools: Vec<HttpToolSpec>,
}

/// Named agents plus the tools they share
#[derive(Clone, Default)]
pub struct AgentCatalog {
    agents: BTreeMap<String, Arc<AgentDefinition>>,
    tools: ToolRegistry,
}

impl AgentCatalog {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            agents: BTreeMap::new(),
            tools,
        }
    }

    /// Load a catalog file: `{"agents": [...], "tools": [...]}`
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CatalogFile =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut tools = ToolRegistry::new();
        for spec in file.tools {
            tools.register(Arc::new(HttpTool::new(spec)));
        }

        let mut catalog = Self::new(tools);
        for agent in file.agents {
            catalog.add(agent)?;
        }

        tracing::info!(
            path = %path.display(),
            agents = ?catalog.names(),
            tools = ?catalog.tools.names(),
            "Agent catalog loaded"
        );
        Ok(catalog)
    }

    /// Add an agent, checking its tool references
    pub fn add(&mut self, agent: AgentDefinition) -> Result<(), CatalogError> {
        if self.agents.contains_key(&agent.name) {
            return Err(CatalogError::DuplicateAgent(agent.name));
        }
        let referenced = agent.tools.iter().chain(agent.preferred_tool.iter());
        for tool in referenced {
            if self.tools.get(tool).is_none() {
                return Err(CatalogError::UnknownTool {
                    agent: agent.name.clone(),
                    tool: tool.clone(),
                });
            }
        }
        self.agents.insert(agent.name.clone(), Arc::new(agent));
        Ok(())
    }

    #[must_use]
    pub fn with_agent(mut self, agent: AgentDefinition) -> Self {
        if let Err(e) = self.add(agent) {
            tracing::warn!(error = %e, "Skipping agent");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.get(name).cloned()
    }

    /// Agent names, sorted
    pub fn names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
