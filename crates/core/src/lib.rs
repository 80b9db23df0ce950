//! # WellCoach Core
//!
//! Domain types, traits, and error definitions for the WellCoach daily plan
//! generator. This crate has **no framework dependencies**: it defines the
//! model every other crate builds against.
//!
//! - [`plan`]: the Plan State threaded through one pipeline run
//! - [`agent`]: the closed set of agent roles and pipeline nodes
//! - [`provider`]: the trait over hosted chat-completion backends
//! - [`error`]: the error taxonomy shared by gateway, templates and pipeline

pub mod agent;
pub mod error;
pub mod message;
pub mod plan;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentRole, PipelineNode};
pub use error::{Error, GatewayError, ProviderError, Result, StepError, TemplateError};
pub use message::{Message, Role};
pub use plan::{DailyPlan, NextAgent, PlanState};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
