//! Model gateway: maps a logical agent name to a ready-to-invoke client.
//!
//! Initialization runs once and never fails outright. When the live
//! configuration yields no usable client the gateway retries with
//! [`ModelConfig::fallback`]; if that fails too, the failure is kept as state
//! and reported by every [`ModelGateway::resolve`] call.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::{debug, error, info, warn};
use wellcoach_config::{AgentModelConfig, AppConfig, ConfigError, ModelConfig};
use wellcoach_core::error::{GatewayError, ProviderError};
use wellcoach_core::provider::{Provider, ProviderRequest, Usage};

use crate::factory::{HttpProviderFactory, ProviderFactory};

static SHARED: OnceLock<Arc<ModelGateway>> = OnceLock::new();

/// Which configuration the gateway ended up running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Primary,
    Fallback,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// An agent left out during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAgent {
    pub agent: String,
    pub provider: String,
    pub reason: String,
}

/// Outcome of gateway initialization, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GatewayStatus {
    Ready {
        source: ConfigSource,
        agents: Vec<String>,
        skipped: Vec<SkippedAgent>,
    },
    Failed {
        reason: String,
    },
}

/// Text reply of one model call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
    pub model: String,
}

/// A chat-completion client bound to one agent's model settings.
#[derive(Clone)]
pub struct AgentClient {
    agent: String,
    provider_name: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    provider: Arc<dyn Provider>,
}

impl AgentClient {
    fn new(agent: &str, mapping: &AgentModelConfig, provider: Arc<dyn Provider>) -> Self {
        Self {
            agent: agent.to_string(),
            provider_name: mapping.provider.clone(),
            model: mapping.model.clone(),
            temperature: mapping.temperature,
            max_tokens: mapping.max_tokens,
            provider,
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Send the rendered prompt as a single user message.
    pub async fn invoke(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let request = ProviderRequest::prompt(&self.model, prompt, self.temperature)
            .with_max_tokens(self.max_tokens);

        debug!(agent = %self.agent, provider = %self.provider_name, model = %self.model, "Invoking model");
        let response = self.provider.complete(request).await?;

        Ok(Completion {
            text: response.message.content,
            usage: response.usage,
            model: response.model,
        })
    }

    /// Check that the backing provider is reachable with its credential.
    pub async fn health_check(&self) -> Result<bool, ProviderError> {
        self.provider.health_check().await
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("agent", &self.agent)
            .field("provider", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

enum GatewayState {
    Ready {
        source: ConfigSource,
        /// Every agent name in the active mapping, sorted.
        known: Vec<String>,
        clients: BTreeMap<String, AgentClient>,
        skipped: Vec<SkippedAgent>,
    },
    Failed {
        reason: String,
    },
}

/// Resolves logical agent names to model clients.
pub struct ModelGateway {
    state: GatewayState,
}

struct Built {
    known: Vec<String>,
    clients: BTreeMap<String, AgentClient>,
    skipped: Vec<SkippedAgent>,
}

impl ModelGateway {
    /// Run the initialization protocol against an already-loaded configuration.
    ///
    /// `lookup` resolves `env:VARNAME` key references.
    pub fn initialize(
        primary: Result<ModelConfig, ConfigError>,
        lookup: &dyn Fn(&str) -> Option<String>,
        factory: &dyn ProviderFactory,
    ) -> Self {
        let primary_failure = match primary {
            Ok(config) => match build(&config, lookup, factory) {
                Ok(built) => return Self::ready(ConfigSource::Primary, built),
                Err(reason) => reason,
            },
            Err(e) => format!("failed to load model configuration: {e}"),
        };

        warn!(reason = %primary_failure, "Primary model configuration unusable, trying fallback");

        match build(&ModelConfig::fallback(), lookup, factory) {
            Ok(built) => Self::ready(ConfigSource::Fallback, built),
            Err(fallback_failure) => {
                let reason = format!("{primary_failure}; fallback also failed: {fallback_failure}");
                error!(reason = %reason, "Model gateway initialization failed");
                Self {
                    state: GatewayState::Failed { reason },
                }
            }
        }
    }

    /// Load `~/.wellcoach/config.toml` and resolve keys from the process environment.
    pub fn from_env() -> Self {
        Self::initialize(
            AppConfig::load().map(|c| c.models),
            &|var| std::env::var(var).ok(),
            &HttpProviderFactory,
        )
    }

    /// The process-wide gateway, initialized by the first caller.
    pub fn shared() -> Arc<ModelGateway> {
        SHARED.get_or_init(|| Arc::new(Self::from_env())).clone()
    }

    fn ready(source: ConfigSource, built: Built) -> Self {
        info!(
            source = %source,
            agents = ?built.clients.keys().collect::<Vec<_>>(),
            skipped = built.skipped.len(),
            "Model gateway ready"
        );
        Self {
            state: GatewayState::Ready {
                source,
                known: built.known,
                clients: built.clients,
                skipped: built.skipped,
            },
        }
    }

    /// Look up the client for `agent`.
    pub fn resolve(&self, agent: &str) -> Result<AgentClient, GatewayError> {
        match &self.state {
            GatewayState::Failed { reason } => Err(GatewayError::GatewayNotInitialized {
                reason: reason.clone(),
            }),
            GatewayState::Ready {
                known,
                clients,
                skipped,
                ..
            } => {
                if let Some(client) = clients.get(agent) {
                    return Ok(client.clone());
                }
                if let Some(s) = skipped.iter().find(|s| s.agent == agent) {
                    return Err(GatewayError::MissingCredential {
                        agent: s.agent.clone(),
                        provider: s.provider.clone(),
                    });
                }
                Err(GatewayError::UnknownAgent {
                    agent: agent.to_string(),
                    known: known.clone(),
                })
            }
        }
    }

    pub fn status(&self) -> GatewayStatus {
        match &self.state {
            GatewayState::Ready {
                source,
                clients,
                skipped,
                ..
            } => GatewayStatus::Ready {
                source: *source,
                agents: clients.keys().cloned().collect(),
                skipped: skipped.clone(),
            },
            GatewayState::Failed { reason } => GatewayStatus::Failed {
                reason: reason.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, GatewayState::Ready { .. })
    }

    /// Ready clients, ordered by agent name.
    pub fn clients(&self) -> Vec<AgentClient> {
        match &self.state {
            GatewayState::Ready { clients, .. } => clients.values().cloned().collect(),
            GatewayState::Failed { .. } => Vec::new(),
        }
    }
}

/// Resolve keys and build one client per agent. Zero clients is an error.
fn build(
    config: &ModelConfig,
    lookup: &dyn Fn(&str) -> Option<String>,
    factory: &dyn ProviderFactory,
) -> Result<Built, String> {
    let resolved = config.resolve_providers(lookup);
    let mut providers: BTreeMap<String, Arc<dyn Provider>> = BTreeMap::new();
    let mut clients = BTreeMap::new();
    let mut skipped = Vec::new();

    for (agent, mapping) in &config.agent_model_mapping {
        let skip = |reason: String| {
            warn!(agent = %agent, provider = %mapping.provider, reason = %reason, "Skipping agent");
            SkippedAgent {
                agent: agent.clone(),
                provider: mapping.provider.clone(),
                reason,
            }
        };

        let Some(settings) = resolved.get(&mapping.provider) else {
            skipped.push(skip(format!("provider '{}' is not configured", mapping.provider)));
            continue;
        };
        if !settings.has_key() {
            skipped.push(skip(format!("provider '{}' has no API key", mapping.provider)));
            continue;
        }

        let cached = providers.get(&mapping.provider).cloned();
        let provider = match cached {
            Some(p) => p,
            None => match factory.build(settings) {
                Ok(p) => {
                    providers.insert(mapping.provider.clone(), p.clone());
                    p
                }
                Err(e) => {
                    skipped.push(skip(e.to_string()));
                    continue;
                }
            },
        };

        info!(agent = %agent, provider = %mapping.provider, model = %mapping.model, "Model client ready");
        clients.insert(agent.clone(), AgentClient::new(agent, mapping, provider));
    }

    if clients.is_empty() {
        let detail = if skipped.is_empty() {
            "no agents are mapped".to_string()
        } else {
            skipped
                .iter()
                .map(|s| format!("{}: {}", s.agent, s.reason))
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(format!("no model clients could be initialized ({detail})"));
    }

    Ok(Built {
        known: config.agent_names(),
        clients,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use wellcoach_config::{ProviderConfig, ResolvedProvider};
    use wellcoach_core::message::{Message, Role};
    use wellcoach_core::provider::ProviderResponse;

    /// Echoes the prompt back and records every request it sees.
    struct RecordingProvider {
        name: String,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let reply = format!("echo: {}", request.messages[0].content);
            let model = request.model.clone();
            self.seen.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: Message::assistant(reply),
                usage: Some(Usage {
                    prompt_tokens: 3,
                    completion_tokens: 2,
                    total_tokens: 5,
                }),
                model,
            })
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        built: Mutex<Vec<String>>,
        last: Mutex<Option<Arc<RecordingProvider>>>,
    }

    impl ProviderFactory for RecordingFactory {
        fn build(&self, provider: &ResolvedProvider) -> Result<Arc<dyn Provider>, ProviderError> {
            self.built.lock().unwrap().push(provider.name.clone());
            let p = Arc::new(RecordingProvider {
                name: provider.name.clone(),
                seen: Mutex::new(Vec::new()),
            });
            *self.last.lock().unwrap() = Some(p.clone());
            Ok(p)
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    fn three_agents() -> ModelConfig {
        let mut config = ModelConfig::default();
        config
            .providers
            .insert("openai".into(), ProviderConfig::from_env("OPENAI_API_KEY"));
        config
            .providers
            .insert("anthropic".into(), ProviderConfig::from_env("ANTHROPIC_API_KEY"));
        config.agent_model_mapping.insert(
            "lead_agent".into(),
            AgentModelConfig::new("openai", "gpt-4o-mini", 0.3),
        );
        config.agent_model_mapping.insert(
            "nutrition_agent".into(),
            AgentModelConfig::new("anthropic", "claude-3-5-sonnet-latest", 0.5),
        );
        config.agent_model_mapping.insert(
            "cbt_agent".into(),
            AgentModelConfig::new("openai", "gpt-4o-mini", 0.7),
        );
        config
    }

    fn load_error() -> ConfigError {
        ConfigError::ParseError {
            path: PathBuf::from("/tmp/config.toml"),
            reason: "expected `=`".into(),
        }
    }

    #[test]
    fn resolves_every_agent_with_a_key() {
        let factory = RecordingFactory::default();
        let gw = ModelGateway::initialize(
            Ok(three_agents()),
            &env(&[("OPENAI_API_KEY", "sk-o"), ("ANTHROPIC_API_KEY", "sk-a")]),
            &factory,
        );

        let lead = gw.resolve("lead_agent").unwrap();
        assert_eq!(lead.model(), "gpt-4o-mini");
        assert_eq!(lead.provider_name(), "openai");
        assert!((lead.temperature() - 0.3).abs() < f32::EPSILON);
        assert_eq!(gw.resolve("nutrition_agent").unwrap().provider_name(), "anthropic");
        assert!(gw.resolve("cbt_agent").is_ok());

        // one provider instance per provider name
        let built = factory.built.lock().unwrap();
        assert_eq!(built.len(), 2);
    }

    #[test]
    fn unknown_agent_lists_known_names() {
        let gw = ModelGateway::initialize(
            Ok(three_agents()),
            &env(&[("OPENAI_API_KEY", "sk-o"), ("ANTHROPIC_API_KEY", "sk-a")]),
            &RecordingFactory::default(),
        );

        let err = gw.resolve("sleep_agent").unwrap_err();
        match &err {
            GatewayError::UnknownAgent { agent, known } => {
                assert_eq!(agent, "sleep_agent");
                assert_eq!(known, &["cbt_agent", "lead_agent", "nutrition_agent"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("lead_agent") && msg.contains("nutrition_agent"));
    }

    #[test]
    fn agent_without_key_is_skipped_at_init() {
        // ANTHROPIC_API_KEY unset
        let gw = ModelGateway::initialize(
            Ok(three_agents()),
            &env(&[("OPENAI_API_KEY", "sk-o")]),
            &RecordingFactory::default(),
        );

        assert!(gw.resolve("lead_agent").is_ok());
        assert!(gw.resolve("cbt_agent").is_ok());
        match gw.resolve("nutrition_agent").unwrap_err() {
            GatewayError::MissingCredential { agent, provider } => {
                assert_eq!(agent, "nutrition_agent");
                assert_eq!(provider, "anthropic");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        match gw.status() {
            GatewayStatus::Ready {
                source,
                agents,
                skipped,
            } => {
                assert_eq!(source, ConfigSource::Primary);
                assert_eq!(agents, vec!["cbt_agent", "lead_agent"]);
                assert_eq!(skipped.len(), 1);
                assert_eq!(skipped[0].agent, "nutrition_agent");
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn falls_back_when_primary_fails_to_load() {
        let gw = ModelGateway::initialize(
            Err(load_error()),
            &env(&[("OPENAI_API_KEY", "sk-o"), ("ANTHROPIC_API_KEY", "sk-a")]),
            &RecordingFactory::default(),
        );

        assert!(gw.is_ready());
        assert_eq!(gw.resolve("lead_agent").unwrap().model(), "gpt-4o-mini");
        assert!(gw.resolve("nutrition_agent").is_ok());
        // fallback only maps two agents
        assert!(matches!(
            gw.resolve("cbt_agent"),
            Err(GatewayError::UnknownAgent { .. })
        ));
        assert!(matches!(
            gw.status(),
            GatewayStatus::Ready {
                source: ConfigSource::Fallback,
                ..
            }
        ));
    }

    #[test]
    fn falls_back_when_primary_yields_no_clients() {
        let mut config = ModelConfig::default();
        config
            .providers
            .insert("groq".into(), ProviderConfig::from_env("GROQ_API_KEY"));
        config.agent_model_mapping.insert(
            "lead_agent".into(),
            AgentModelConfig::new("groq", "llama-3.1-70b", 0.2),
        );

        let gw = ModelGateway::initialize(
            Ok(config),
            &env(&[("OPENAI_API_KEY", "sk-o")]),
            &RecordingFactory::default(),
        );

        assert!(matches!(
            gw.status(),
            GatewayStatus::Ready {
                source: ConfigSource::Fallback,
                ..
            }
        ));
        assert_eq!(gw.resolve("lead_agent").unwrap().provider_name(), "openai");
    }

    #[test]
    fn permanent_failure_keeps_original_reason() {
        let gw = ModelGateway::initialize(Err(load_error()), &env(&[]), &RecordingFactory::default());

        assert!(!gw.is_ready());
        assert!(gw.clients().is_empty());
        for agent in ["lead_agent", "nutrition_agent", "anything"] {
            match gw.resolve(agent).unwrap_err() {
                GatewayError::GatewayNotInitialized { reason } => {
                    assert!(reason.contains("expected `=`"), "reason was: {reason}");
                    assert!(reason.contains("fallback also failed"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn invoke_sends_single_user_message_with_agent_settings() {
        let factory = RecordingFactory::default();
        let mut config = ModelConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-literal".into()),
                api_url: None,
            },
        );
        let mut mapping = AgentModelConfig::new("openai", "gpt-4o-mini", 0.3);
        mapping.max_tokens = Some(800);
        config.agent_model_mapping.insert("lead_agent".into(), mapping);

        let gw = ModelGateway::initialize(Ok(config), &env(&[]), &factory);
        let completion = gw
            .resolve("lead_agent")
            .unwrap()
            .invoke("Plan the day")
            .await
            .unwrap();

        assert_eq!(completion.text, "echo: Plan the day");
        assert_eq!(completion.usage.unwrap().total_tokens, 5);

        let provider = factory.last.lock().unwrap().clone().unwrap();
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gpt-4o-mini");
        assert_eq!(seen[0].max_tokens, Some(800));
        assert!((seen[0].temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(seen[0].messages.len(), 1);
        assert_eq!(seen[0].messages[0].role, Role::User);
    }
}
