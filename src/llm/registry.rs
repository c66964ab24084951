//! Model registry for managing available LLM providers

use super::{GeminiModel, GeminiService, LlmService, LoggingService};
use std::collections::HashMap;
use std::sync::Arc;

const FALLBACK_DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub gemini_api_key: Option<String>,
    /// Gateway URL that authenticates requests on our behalf
    pub gateway: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    /// Create an empty registry for testing purposes
    pub fn new_empty() -> Self {
        Self {
            services: HashMap::new(),
            default_model: "test-model".to_string(),
        }
    }

    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        // In gateway mode, use "implicit" as the API key
        let api_key = if config.gateway.is_some() {
            Some("implicit".to_string())
        } else {
            config.gemini_api_key.clone().filter(|k| !k.is_empty())
        };

        if let Some(api_key) = api_key {
            for model in GeminiModel::ALL {
                let service: Arc<dyn LlmService> = Arc::new(GeminiService::new(
                    api_key.clone(),
                    model,
                    config.gateway.as_deref(),
                ));
                services.insert(
                    model.api_name().to_string(),
                    Arc::new(LoggingService::new(service)),
                );
            }
        }

        let default_model = config
            .default_model
            .clone()
            .unwrap_or_else(|| FALLBACK_DEFAULT_MODEL.to_string());

        Self {
            services,
            default_model,
        }
    }

    /// Register a service under its own model id
    pub fn register(&mut self, service: Arc<dyn LlmService>) {
        self.services.insert(service.model_id().to_string(), service);
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Get a model by ID, falling back to the default
    pub fn get_or_default(&self, model_id: Option<&str>) -> Option<Arc<dyn LlmService>> {
        model_id.and_then(|id| self.get(id)).or_else(|| self.default())
    }

    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.services.keys().cloned().collect();
        models.sort();
        models
    }
}
