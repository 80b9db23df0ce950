//! Agent roles and pipeline nodes.
//!
//! The set of agents is closed: each role maps at compile time to its
//! configuration key, so the pipeline never looks agents up by free-form name.

use serde::{Deserialize, Serialize};

/// A model-backed agent in the plan pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Reads the whole profile and steers the specialists
    Lead,
    /// Produces the nutrition plan
    Nutrition,
    /// Produces the CBT / mindfulness task
    Cbt,
}

impl AgentRole {
    pub const ALL: [AgentRole; 3] = [AgentRole::Lead, AgentRole::Nutrition, AgentRole::Cbt];

    /// The key this agent is listed under in `agent_model_mapping`.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Lead => "lead_agent",
            Self::Nutrition => "nutrition_agent",
            Self::Cbt => "cbt_agent",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

/// A node of the fixed plan-generation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineNode {
    Lead,
    Nutrition,
    Cbt,
    Finalize,
}

impl PipelineNode {
    /// The agent behind this node, `None` for the model-free finalize step.
    pub fn agent(self) -> Option<AgentRole> {
        match self {
            Self::Lead => Some(AgentRole::Lead),
            Self::Nutrition => Some(AgentRole::Nutrition),
            Self::Cbt => Some(AgentRole::Cbt),
            Self::Finalize => None,
        }
    }
}

impl std::fmt::Display for PipelineNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lead => write!(f, "lead"),
            Self::Nutrition => write!(f, "nutrition"),
            Self::Cbt => write!(f, "cbt"),
            Self::Finalize => write!(f, "finalize"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_keys_are_stable() {
        let keys: Vec<_> = AgentRole::ALL.iter().map(|r| r.config_key()).collect();
        assert_eq!(keys, vec!["lead_agent", "nutrition_agent", "cbt_agent"]);
    }

    #[test]
    fn finalize_has_no_agent() {
        assert_eq!(PipelineNode::Finalize.agent(), None);
        assert_eq!(PipelineNode::Cbt.agent(), Some(AgentRole::Cbt));
    }
}
