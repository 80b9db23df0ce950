//! Data model for pipeline traces and step spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use wellcoach_core::agent::PipelineNode;
use wellcoach_core::error::StepError;
use wellcoach_core::provider::Usage;

// ── Span ──────────────────────────────────────────────────────────────────

/// How a step ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed {
        /// Stable error kind, e.g. `json_parse_failure`.
        kind: String,
        message: String,
    },
}

/// One executed pipeline node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpan {
    /// Unique identifier.
    pub id: String,
    pub node: PipelineNode,
    /// Configuration key of the agent behind the node (None for finalize).
    pub agent: Option<String>,
    /// Model that answered, once known.
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds (computed on end).
    pub duration_ms: Option<u64>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    /// None while the step is still running.
    pub outcome: Option<StepOutcome>,
}

impl StepSpan {
    /// Open a span for `node`, starting the clock now.
    pub fn start(node: PipelineNode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node,
            agent: node.agent().map(|a| a.config_key().to_string()),
            model: None,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input_tokens: None,
            output_tokens: None,
            outcome: None,
        }
    }

    pub fn record_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    pub fn record_usage(&mut self, usage: &Usage) {
        self.input_tokens = Some(usage.prompt_tokens);
        self.output_tokens = Some(usage.completion_tokens);
    }

    pub fn succeed(&mut self) {
        self.end(StepOutcome::Succeeded);
    }

    pub fn fail(&mut self, error: &StepError) {
        self.end(StepOutcome::Failed {
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    fn end(&mut self, outcome: StepOutcome) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.outcome = Some(outcome);
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == Some(StepOutcome::Succeeded)
    }

    /// Total tokens (input + output), or 0 if not recorded.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// All spans of one pipeline run, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTrace {
    /// Unique trace id.
    pub id: String,
    pub user_id: String,
    pub spans: Vec<StepSpan>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineTrace {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn add_span(&mut self, span: StepSpan) {
        self.spans.push(span);
    }

    /// Mark the trace as complete.
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Nodes that ran, in order.
    pub fn nodes(&self) -> Vec<PipelineNode> {
        self.spans.iter().map(|s| s.node).collect()
    }

    /// The step that stopped the run, if any.
    pub fn failure(&self) -> Option<&StepSpan> {
        self.spans
            .iter()
            .find(|s| matches!(s.outcome, Some(StepOutcome::Failed { .. })))
    }

    /// Total tokens across all spans.
    pub fn total_tokens(&self) -> u32 {
        self.spans.iter().map(|s| s.total_tokens()).sum()
    }

    /// Total duration in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.spans.iter().filter_map(|s| s.duration_ms).sum()
    }

    /// Number of steps that reached a model.
    pub fn model_call_count(&self) -> usize {
        self.spans.iter().filter(|s| s.model.is_some()).count()
    }

    /// Emit a one-line summary of the run.
    pub fn log_summary(&self) {
        let failed = self.failure().map(|s| s.node.to_string());
        info!(
            trace_id = %self.id,
            user_id = %self.user_id,
            steps = self.spans.len(),
            model_calls = self.model_call_count(),
            tokens = self.total_tokens(),
            duration_ms = self.total_duration_ms(),
            failed_step = failed.as_deref().unwrap_or("none"),
            "Pipeline run finished"
        );
    }
}
