//! Hosted model clients and the model gateway for WellCoach.
//!
//! All clients implement the `wellcoach_core::Provider` trait. The gateway
//! builds them through a [`ProviderFactory`] and hands them out per agent.

pub mod anthropic;
pub mod factory;
pub mod gateway;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use factory::{HttpProviderFactory, ProviderFactory, default_base_url};
pub use gateway::{AgentClient, Completion, ConfigSource, GatewayStatus, ModelGateway, SkippedAgent};
pub use openai_compat::OpenAiCompatProvider;
