//! Template variables for each agent, built from the Plan State.
//!
//! Real upstream data is used when the state carries it; otherwise each
//! variable gets a fixed placeholder so the prompt still renders.

use serde_json::{Map, Value};
use tracing::debug;
use wellcoach_core::agent::AgentRole;
use wellcoach_core::plan::PlanState;

use crate::prompts::TemplateVars;

pub const DEFAULT_PROTOCOL_PHASE: &str = "Phase 1";
pub const NO_RECENT_DATA: &str = "No recent data available.";
pub const NO_OVERRIDE: &str = "None";
pub const NO_MOOD_ENTRIES: &str = "No mood entries logged today.";

/// What the lead agent told the specialists. Lives only for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadGuidance {
    pub nutrition_directive: Option<String>,
    pub cbt_directive: Option<String>,
}

impl LeadGuidance {
    /// Pick the directives out of a parsed lead reply. Missing or non-string
    /// fields are left unset.
    pub fn from_reply(reply: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            reply
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            nutrition_directive: text("nutrition_directive"),
            cbt_directive: text("cbt_directive"),
        }
    }
}

/// Build the exact variable set `role`'s template declares.
pub fn variables_for(role: AgentRole, state: &PlanState, guidance: &LeadGuidance) -> TemplateVars {
    let mut vars = TemplateVars::new();
    match role {
        AgentRole::Lead => {
            vars.insert("user_profile", pretty(&state.user_profile));
            vars.insert("protocol_phase", protocol_phase(state));
            vars.insert("latest_data", latest_data(state));
            vars.insert("professional_override", professional_override(state));
        }
        AgentRole::Nutrition => {
            let directive = guidance
                .nutrition_directive
                .clone()
                .unwrap_or_else(|| default_nutrition_directive(state));
            vars.insert("directive", directive);
            vars.insert("latest_data", latest_data(state));
            vars.insert("professional_override", professional_override(state));
        }
        AgentRole::Cbt => {
            let directive = guidance
                .cbt_directive
                .clone()
                .unwrap_or_else(|| default_cbt_directive(state));
            vars.insert("directive", directive);
            vars.insert("mood_log", mood_log(state));
        }
    }
    debug!(agent = %role, vars = ?vars.keys().collect::<Vec<_>>(), "Built template variables");
    vars
}

fn pretty(map: &Map<String, Value>) -> String {
    format!("{:#}", Value::Object(map.clone()))
}

fn protocol_phase(state: &PlanState) -> String {
    state
        .user_profile
        .get("protocolPhase")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_PROTOCOL_PHASE)
        .to_string()
}

fn latest_data(state: &PlanState) -> String {
    match &state.api_data {
        Some(data) if !data.is_empty() => pretty(data),
        _ => NO_RECENT_DATA.to_string(),
    }
}

fn professional_override(state: &PlanState) -> String {
    match state.professional_override.as_deref() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => NO_OVERRIDE.to_string(),
    }
}

fn mood_log(state: &PlanState) -> String {
    let entry = state
        .api_data
        .as_ref()
        .and_then(|data| data.get("mood"))
        .or_else(|| state.user_profile.get("moodLog"));

    match entry {
        None | Some(Value::Null) => NO_MOOD_ENTRIES.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => NO_MOOD_ENTRIES.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => format!("{other:#}"),
    }
}

fn default_nutrition_directive(state: &PlanState) -> String {
    format!(
        "Build a balanced meal plan for today that supports a client in {}.",
        protocol_phase(state)
    )
}

fn default_cbt_directive(state: &PlanState) -> String {
    format!(
        "Design a short mindfulness exercise for managing cravings during {}.",
        protocol_phase(state)
    )
}
