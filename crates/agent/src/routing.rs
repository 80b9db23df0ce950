//! The routing function of the plan graph.

use wellcoach_core::agent::PipelineNode;
use wellcoach_core::plan::NextAgent;

/// The node to run after a step, or `None` when the run is over.
///
/// An unset routing signal ends the run; the driver starts every run at
/// [`PipelineNode::Lead`] itself.
pub fn route(next: Option<NextAgent>) -> Option<PipelineNode> {
    match next? {
        NextAgent::ContinueToNutrition => Some(PipelineNode::Nutrition),
        NextAgent::ContinueToCbt => Some(PipelineNode::Cbt),
        NextAgent::ContinueToFinalize => Some(PipelineNode::Finalize),
        NextAgent::Terminate => None,
    }
}
