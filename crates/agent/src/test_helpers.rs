//! Shared test helpers for pipeline tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wellcoach_config::{AgentModelConfig, ModelConfig, ProviderConfig, ResolvedProvider};
use wellcoach_core::error::ProviderError;
use wellcoach_core::message::Message;
use wellcoach_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use wellcoach_providers::{ModelGateway, ProviderFactory};

/// What the scripted provider does for one model.
#[derive(Clone)]
pub enum Script {
    Text(String),
    Fail(ProviderError),
    Delayed(Duration, String),
}

impl Script {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn fail(error: ProviderError) -> Self {
        Self::Fail(error)
    }

    pub fn delayed(delay: Duration, text: &str) -> Self {
        Self::Delayed(delay, text.to_string())
    }
}

/// A mock provider that answers per requested model and records every prompt.
pub struct ScriptedProvider {
    scripts: HashMap<String, Script>,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Set (or replace) the script for `model`.
    pub fn reply(mut self, model: &str, script: Script) -> Self {
        self.scripts.insert(model.to_string(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Prompts sent to `model`, in order.
    pub fn prompts_for(&self, model: &str) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

fn text_response(text: &str, model: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: model.to_string(),
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.seen
            .lock()
            .unwrap()
            .push((request.model.clone(), prompt));

        match self.scripts.get(&request.model).cloned() {
            Some(Script::Text(text)) => Ok(text_response(&text, &request.model)),
            Some(Script::Fail(error)) => Err(error),
            Some(Script::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text_response(&text, &request.model))
            }
            None => Err(ProviderError::ApiError {
                status_code: 404,
                message: format!("no script for model '{}'", request.model),
            }),
        }
    }
}

/// Hands the same provider to every configured provider name.
struct StaticFactory(Arc<dyn Provider>);

impl ProviderFactory for StaticFactory {
    fn build(&self, _provider: &ResolvedProvider) -> Result<Arc<dyn Provider>, ProviderError> {
        Ok(self.0.clone())
    }
}

/// A gateway mapping each given agent to a model served by `provider`.
pub fn gateway_for(provider: Arc<ScriptedProvider>, agents: &[(&str, &str)]) -> Arc<ModelGateway> {
    let mut config = ModelConfig::default();
    config.providers.insert(
        "scripted".into(),
        ProviderConfig {
            api_key: Some("test-key".into()),
            api_url: None,
        },
    );
    for (agent, model) in agents {
        config
            .agent_model_mapping
            .insert(agent.to_string(), AgentModelConfig::new("scripted", *model, 0.5));
    }

    Arc::new(ModelGateway::initialize(
        Ok(config),
        &|_| None,
        &StaticFactory(provider),
    ))
}

/// The standard three-agent gateway: `lead-model`, `nutrition-model`, `cbt-model`.
pub fn gateway_with(provider: Arc<ScriptedProvider>) -> Arc<ModelGateway> {
    gateway_for(
        provider,
        &[
            ("lead_agent", "lead-model"),
            ("nutrition_agent", "nutrition-model"),
            ("cbt_agent", "cbt-model"),
        ],
    )
}
