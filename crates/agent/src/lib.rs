//! The WellCoach plan pipeline.
//!
//! Three model-backed agents run in a fixed order over one Plan State:
//!
//! 1. **Lead** reads the profile, latest data and any professional override,
//!    and hands directives to the specialists
//! 2. **Nutrition** writes the meal plan into `nutritionPlan`
//! 3. **CBT** writes the mindfulness task into `cbtTask`
//! 4. **Finalize** merges both into `dailyPlan`
//!
//! Any failing step ends the run early; the partial state is returned.

pub mod pipeline;
pub mod prompts;
pub mod reply;
pub mod routing;
pub mod variables;

#[cfg(test)]
mod test_helpers;

pub use pipeline::PlanPipeline;
pub use prompts::{CBT_TEMPLATE, LEAD_TEMPLATE, NUTRITION_TEMPLATE, PromptTemplate, TemplateVars};
pub use reply::{parse_reply, strip_code_fences};
pub use routing::route;
pub use variables::{LeadGuidance, variables_for};
