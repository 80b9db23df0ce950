//! Provider construction from resolved configuration.
//!
//! The gateway never builds HTTP clients itself; it asks a [`ProviderFactory`]
//! so tests can swap in scripted providers.

use std::sync::Arc;

use wellcoach_config::ResolvedProvider;
use wellcoach_core::error::ProviderError;
use wellcoach_core::provider::Provider;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Builds a provider from its name and resolved settings.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, provider: &ResolvedProvider) -> Result<Arc<dyn Provider>, ProviderError>;
}

/// The default factory: native Anthropic client for `anthropic`,
/// OpenAI-compatible client for everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, provider: &ResolvedProvider) -> Result<Arc<dyn Provider>, ProviderError> {
        if provider.name == "anthropic" {
            let mut p = AnthropicProvider::new(&provider.api_key)?;
            if let Some(url) = &provider.api_url {
                p = p.with_base_url(url);
            }
            return Ok(Arc::new(p));
        }

        let base_url = provider
            .api_url
            .clone()
            .map(Ok)
            .unwrap_or_else(|| {
                default_base_url(&provider.name).ok_or_else(|| {
                    ProviderError::NotConfigured(format!(
                        "provider '{}' has no api_url and no known default endpoint",
                        provider.name
                    ))
                })
            })?;

        Ok(Arc::new(OpenAiCompatProvider::new(
            &provider.name,
            base_url,
            &provider.api_key,
        )?))
    }
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "anthropic" => "https://api.anthropic.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(name: &str, url: Option<&str>) -> ResolvedProvider {
        ResolvedProvider {
            name: name.into(),
            api_key: "sk-test".into(),
            api_url: url.map(String::from),
        }
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").unwrap().contains("openrouter.ai"));
        assert!(default_base_url("openai").unwrap().contains("api.openai.com"));
        assert!(default_base_url("ollama").unwrap().contains("localhost:11434"));
        assert!(default_base_url("my-private-llm").is_none());
    }

    #[test]
    fn builds_native_anthropic_client() {
        let provider = HttpProviderFactory.build(&resolved("anthropic", None)).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn builds_openai_compatible_client() {
        let provider = HttpProviderFactory.build(&resolved("groq", None)).unwrap();
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn unknown_provider_needs_explicit_url() {
        let err = HttpProviderFactory
            .build(&resolved("my-private-llm", None))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        let provider = HttpProviderFactory
            .build(&resolved("my-private-llm", Some("http://10.0.0.5:9000/v1")))
            .unwrap();
        assert_eq!(provider.name(), "my-private-llm");
    }
}
