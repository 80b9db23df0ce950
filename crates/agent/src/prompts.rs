//! Prompt templates for the three agent roles.
//!
//! Each template is a fixed instruction body with `{{name}}` placeholders and
//! a declared variable set. Rendering checks the supplied variables against
//! that set before producing any text, then substitutes in a single pass:
//! a value that itself contains `{{...}}` is copied through untouched.

use std::collections::BTreeMap;

use wellcoach_core::agent::AgentRole;
use wellcoach_core::error::TemplateError;

/// Variables supplied to [`PromptTemplate::render`], keyed by placeholder name.
pub type TemplateVars = BTreeMap<&'static str, String>;

/// A fixed instruction template for one agent role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    variables: &'static [&'static str],
    body: &'static str,
}

pub const LEAD_TEMPLATE: PromptTemplate = PromptTemplate {
    name: "lead",
    variables: &[
        "user_profile",
        "protocol_phase",
        "latest_data",
        "professional_override",
    ],
    body: r#"You are the lead wellness coach coordinating a team of specialists.
Review the client and decide what today's plan should focus on.

Client profile:
{{user_profile}}

Current protocol phase: {{protocol_phase}}

Latest tracked data:
{{latest_data}}

Professional override (follow it exactly; it takes precedence over the protocol): {{professional_override}}

Respond with a single JSON object and nothing else, shaped like:
{
  "focus": "one sentence describing today's priority",
  "nutrition_directive": "instruction for the nutrition specialist",
  "cbt_directive": "instruction for the CBT specialist",
  "next_agent": "nutrition_agent"
}"#,
};

pub const NUTRITION_TEMPLATE: PromptTemplate = PromptTemplate {
    name: "nutrition",
    variables: &["directive", "latest_data", "professional_override"],
    body: r#"You are a registered nutrition coach building a one-day meal plan.

Directive from the lead coach: {{directive}}

Latest tracked data:
{{latest_data}}

Professional override (follow it exactly; it takes precedence over the protocol): {{professional_override}}

Respond with a single JSON object and nothing else, shaped like:
{
  "meals": [
    {"name": "Breakfast", "time": "08:00", "items": ["..."], "notes": "..."}
  ],
  "hydration": "daily water target",
  "notes": "anything the client should keep in mind"
}"#,
};

pub const CBT_TEMPLATE: PromptTemplate = PromptTemplate {
    name: "cbt",
    variables: &["directive", "mood_log"],
    body: r#"You are a cognitive behavioral therapy coach designing one short mindfulness task for today.

Directive from the lead coach: {{directive}}

Mood and behavior log:
{{mood_log}}

Respond with a single JSON object and nothing else, shaped like:
{
  "session": "title of the session",
  "exercise": "step-by-step instructions",
  "duration_minutes": 10,
  "reflection_prompt": "a question for the client to journal on"
}"#,
};

impl PromptTemplate {
    /// The template behind an agent role.
    pub fn for_role(role: AgentRole) -> &'static PromptTemplate {
        match role {
            AgentRole::Lead => &LEAD_TEMPLATE,
            AgentRole::Nutrition => &NUTRITION_TEMPLATE,
            AgentRole::Cbt => &CBT_TEMPLATE,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The exact variable names this template requires.
    pub fn variables(&self) -> &'static [&'static str] {
        self.variables
    }

    /// Check the supplied variable names against the declared set.
    pub fn check(&self, vars: &TemplateVars) -> Result<(), TemplateError> {
        let missing: Vec<String> = self
            .variables
            .iter()
            .filter(|name| !vars.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        let unexpected: Vec<String> = vars
            .keys()
            .filter(|name| !self.variables.contains(*name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::TemplateVariableMismatch {
                template: self.name.to_string(),
                missing,
                unexpected,
            })
        }
    }

    /// Interpolate `vars` into the template.
    pub fn render(&self, vars: &TemplateVars) -> Result<String, TemplateError> {
        self.check(vars)?;

        let extra: usize = vars.values().map(String::len).sum();
        let mut out = String::with_capacity(self.body.len() + extra);
        let mut rest = self.body;

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            let name = rest[start + 2..start + 2 + len].trim();
            out.push_str(&rest[..start]);
            match vars.get(name) {
                Some(value) => out.push_str(value),
                // not a placeholder of ours, keep the braces
                None => out.push_str(&rest[start..start + 4 + len]),
            }
            rest = &rest[start + 4 + len..];
        }
        out.push_str(rest);

        Ok(out)
    }
}
