//! Plan State, the record threaded through one pipeline run.
//!
//! A fresh `PlanState` is created per request, accumulates each agent's
//! output, and is handed back to the caller when the run ends. The core never
//! inspects the JSON bags it carries; it only passes them through.
//!
//! Invariants enforced here rather than by callers:
//! - `nutritionPlan` and `cbtTask` are write-once.
//! - `dailyPlan` is only built by [`PlanState::finalize`].
//! - none of the three output fields is accepted from deserialized input.
//! - once `nextAgent` is terminate it stays terminate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Routing signal: which step runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NextAgent {
    ContinueToNutrition,
    ContinueToCbt,
    ContinueToFinalize,
    Terminate,
}

impl NextAgent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContinueToNutrition => "nutrition_agent",
            Self::ContinueToCbt => "cbt_agent",
            Self::ContinueToFinalize => "finalize",
            Self::Terminate => "end",
        }
    }

    /// Parse a routing value. Anything outside the closed set means terminate.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "nutrition_agent" => Self::ContinueToNutrition,
            "cbt_agent" => Self::ContinueToCbt,
            "finalize" => Self::ContinueToFinalize,
            _ => Self::Terminate,
        }
    }
}

impl From<String> for NextAgent {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<NextAgent> for String {
    fn from(value: NextAgent) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for NextAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal output of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mindfulness: Option<Value>,
}

impl DailyPlan {
    /// Both sections present.
    pub fn is_complete(&self) -> bool {
        self.nutrition.is_some() && self.mindfulness.is_some()
    }
}

/// Mutable state of one plan-generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanState {
    pub user_id: String,

    #[serde(default)]
    pub user_profile: Map<String, Value>,

    /// Per-source telemetry (wearable, biomarker, mood, ...), opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_data: Option<Map<String, Value>>,

    /// Instruction from a professional; downstream agents must honor it verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional_override: Option<String>,

    // Step outputs are never read from input; only the pipeline writes them.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    nutrition_plan: Option<Value>,

    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    cbt_task: Option<Value>,

    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    daily_plan: Option<DailyPlan>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_agent: Option<NextAgent>,
}

impl PlanState {
    /// Create a fresh state for one run.
    pub fn new(user_id: impl Into<String>, user_profile: Map<String, Value>) -> Self {
        Self {
            user_id: user_id.into(),
            user_profile,
            ..Self::default()
        }
    }

    pub fn with_api_data(mut self, api_data: Map<String, Value>) -> Self {
        self.api_data = Some(api_data);
        self
    }

    pub fn with_professional_override(mut self, text: impl Into<String>) -> Self {
        self.professional_override = Some(text.into());
        self
    }

    pub fn nutrition_plan(&self) -> Option<&Value> {
        self.nutrition_plan.as_ref()
    }

    pub fn cbt_task(&self) -> Option<&Value> {
        self.cbt_task.as_ref()
    }

    pub fn daily_plan(&self) -> Option<&DailyPlan> {
        self.daily_plan.as_ref()
    }

    pub fn next_agent(&self) -> Option<NextAgent> {
        self.next_agent
    }

    pub fn is_terminated(&self) -> bool {
        self.next_agent == Some(NextAgent::Terminate)
    }

    /// Advance the routing signal. A terminated state stays terminated.
    pub fn route_to(&mut self, next: NextAgent) {
        if self.is_terminated() && next != NextAgent::Terminate {
            warn!(user_id = %self.user_id, requested = %next, "Ignoring routing change after termination");
            return;
        }
        self.next_agent = Some(next);
    }

    pub fn terminate(&mut self) {
        self.next_agent = Some(NextAgent::Terminate);
    }

    /// Store the nutrition plan. Returns `false` if one was already recorded.
    pub fn record_nutrition_plan(&mut self, plan: Value) -> bool {
        set_once(&mut self.nutrition_plan, plan, "nutritionPlan", &self.user_id)
    }

    /// Store the CBT task. Returns `false` if one was already recorded.
    pub fn record_cbt_task(&mut self, task: Value) -> bool {
        set_once(&mut self.cbt_task, task, "cbtTask", &self.user_id)
    }

    /// Merge the agent outputs into the daily plan and end the run.
    ///
    /// Either section may be missing; this never fails.
    pub fn finalize(&mut self) -> &DailyPlan {
        let plan = DailyPlan {
            nutrition: self.nutrition_plan.clone(),
            mindfulness: self.cbt_task.clone(),
        };
        self.terminate();
        self.daily_plan.insert(plan)
    }

    /// True when the run produced a daily plan with both sections.
    pub fn is_complete(&self) -> bool {
        self.daily_plan.as_ref().is_some_and(DailyPlan::is_complete)
    }
}

fn set_once(slot: &mut Option<Value>, value: Value, field: &str, user_id: &str) -> bool {
    if slot.is_some() {
        warn!(user_id = %user_id, field, "Field already populated, keeping the first value");
        return false;
    }
    *slot = Some(value);
    true
}
