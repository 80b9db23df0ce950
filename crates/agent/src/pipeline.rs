//! The plan-generation pipeline: lead → nutrition → CBT → finalize.
//!
//! ```text
//!  START
//!    │
//!    ▼
//! ┌──────┐ ok ┌───────────┐ ok ┌─────┐ ok ┌──────────┐
//! │ Lead │───▶│ Nutrition │───▶│ CBT │───▶│ Finalize │──▶ END
//! └──┬───┘    └─────┬─────┘    └──┬──┘    └──────────┘
//!    │ err          │ err         │ err
//!    ▼              ▼             ▼
//!   END            END           END   (partial Plan State returned)
//! ```
//!
//! A run never returns an error. Whatever the failing step was, the caller
//! gets the Plan State as it stood, with `nextAgent = "end"`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use wellcoach_config::PipelineConfig;
use wellcoach_core::agent::{AgentRole, PipelineNode};
use wellcoach_core::error::{ProviderError, StepError};
use wellcoach_core::plan::{NextAgent, PlanState};
use wellcoach_providers::ModelGateway;
use wellcoach_telemetry::{PipelineTrace, StepSpan};

use crate::prompts::PromptTemplate;
use crate::reply::parse_reply;
use crate::routing::route;
use crate::variables::{LeadGuidance, variables_for};

/// Drives one Plan State through the agent graph.
pub struct PlanPipeline {
    gateway: Arc<ModelGateway>,
    /// Upper bound on a single model call; `None` waits indefinitely.
    step_timeout: Option<Duration>,
}

impl PlanPipeline {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self {
            gateway,
            step_timeout: None,
        }
    }

    /// Build a pipeline with the driver settings from configuration.
    pub fn from_config(gateway: Arc<ModelGateway>, config: &PipelineConfig) -> Self {
        Self::new(gateway).with_step_timeout(config.step_timeout())
    }

    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Run the pipeline and return the final Plan State.
    pub async fn run(&self, state: PlanState) -> PlanState {
        self.run_traced(state).await.0
    }

    /// Run the pipeline, also returning one span per executed node.
    pub async fn run_traced(&self, mut state: PlanState) -> (PlanState, PipelineTrace) {
        let mut trace = PipelineTrace::new(&state.user_id);

        if state.is_terminated() {
            info!(user_id = %state.user_id, "Plan state already terminated, nothing to run");
            trace.end();
            return (state, trace);
        }

        info!(user_id = %state.user_id, "Starting plan pipeline");

        let mut guidance = LeadGuidance::default();
        let mut node = Some(PipelineNode::Lead);

        while let Some(current) = node {
            let mut span = StepSpan::start(current);

            match current.agent() {
                None => {
                    let plan = state.finalize();
                    debug!(
                        has_nutrition = plan.nutrition.is_some(),
                        has_mindfulness = plan.mindfulness.is_some(),
                        "Daily plan assembled"
                    );
                    span.succeed();
                }
                Some(role) => match self.run_agent(role, &state, &guidance, &mut span).await {
                    Ok(reply) => {
                        apply_reply(role, reply, &mut state, &mut guidance);
                        span.succeed();
                    }
                    Err(e) => {
                        warn!(
                            user_id = %state.user_id,
                            step = %current,
                            kind = e.kind(),
                            error = %e,
                            "Step failed, ending run with partial plan"
                        );
                        span.fail(&e);
                        state.terminate();
                    }
                },
            }

            trace.add_span(span);
            node = route(state.next_agent());
        }

        trace.end();
        trace.log_summary();
        if !state.is_complete() {
            warn!(user_id = %state.user_id, "Plan partially generated");
        }

        (state, trace)
    }

    /// Render, resolve, invoke and parse for one agent step.
    async fn run_agent(
        &self,
        role: AgentRole,
        state: &PlanState,
        guidance: &LeadGuidance,
        span: &mut StepSpan,
    ) -> Result<Map<String, Value>, StepError> {
        let prompt = PromptTemplate::for_role(role).render(&variables_for(role, state, guidance))?;
        let client = self.gateway.resolve(role.config_key())?;
        span.record_model(client.model());

        debug!(agent = %role, model = %client.model(), prompt_len = prompt.len(), "Running agent step");

        let invocation = client.invoke(&prompt);
        let result = match self.step_timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "agent '{}' did not reply within {}s",
                    role.config_key(),
                    limit.as_secs()
                ))),
            },
            None => invocation.await,
        };

        let completion = result.map_err(|source| StepError::ModelInvocationFailure {
            agent: role.config_key().to_string(),
            source,
        })?;
        if let Some(usage) = &completion.usage {
            span.record_usage(usage);
        }

        parse_reply(role, &completion.text)
    }
}

/// Merge a successful reply into the state and advance routing.
fn apply_reply(
    role: AgentRole,
    reply: Map<String, Value>,
    state: &mut PlanState,
    guidance: &mut LeadGuidance,
) {
    match role {
        AgentRole::Lead => {
            if let Some(requested) = reply.get("next_agent").and_then(Value::as_str) {
                debug!(requested, "Lead routing hint (graph order is fixed)");
            }
            *guidance = LeadGuidance::from_reply(&reply);
            state.route_to(NextAgent::ContinueToNutrition);
        }
        AgentRole::Nutrition => {
            state.record_nutrition_plan(Value::Object(reply));
            state.route_to(NextAgent::ContinueToCbt);
        }
        AgentRole::Cbt => {
            state.record_cbt_task(Value::Object(reply));
            state.route_to(NextAgent::ContinueToFinalize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{Script, ScriptedProvider, gateway_with};
    use serde_json::json;
    use wellcoach_core::plan::DailyPlan;

    fn alex() -> PlanState {
        serde_json::from_value(json!({"userId": "u1", "userProfile": {"firstName": "Alex"}}))
            .unwrap()
    }

    fn happy_script() -> ScriptedProvider {
        ScriptedProvider::new()
            .reply(
                "lead-model",
                Script::text(
                    r#"{"focus": "steady energy", "nutrition_directive": "High protein", "cbt_directive": "Urge surfing before lunch", "next_agent": "nutrition_agent"}"#,
                ),
            )
            .reply(
                "nutrition-model",
                Script::text("```json\n{\"meals\": [\"oats\", \"salad\"]}\n```"),
            )
            .reply("cbt-model", Script::text(r#"{"session": "Phase 1 cravings"}"#))
    }

    #[tokio::test]
    async fn full_run_builds_daily_plan() {
        let provider = Arc::new(happy_script());
        let pipeline = PlanPipeline::new(gateway_with(provider.clone()));

        let (state, trace) = pipeline.run_traced(alex()).await;

        assert_eq!(
            state.daily_plan(),
            Some(&DailyPlan {
                nutrition: Some(json!({"meals": ["oats", "salad"]})),
                mindfulness: Some(json!({"session": "Phase 1 cravings"})),
            })
        );
        assert!(state.is_complete());
        assert_eq!(state.next_agent(), Some(NextAgent::Terminate));
        assert_eq!(
            trace.nodes(),
            vec![
                PipelineNode::Lead,
                PipelineNode::Nutrition,
                PipelineNode::Cbt,
                PipelineNode::Finalize
            ]
        );
        assert!(trace.failure().is_none());
        assert_eq!(trace.model_call_count(), 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn lead_directives_reach_specialist_prompts() {
        let provider = Arc::new(happy_script());
        let pipeline = PlanPipeline::new(gateway_with(provider.clone()));
        pipeline.run(alex()).await;

        let prompts = provider.prompts_for("nutrition-model");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Directive from the lead coach: High protein"));

        let prompts = provider.prompts_for("cbt-model");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Directive from the lead coach: Urge surfing before lunch"));
    }

    #[tokio::test]
    async fn caller_supplied_daily_plan_does_not_survive_a_failed_run() {
        let provider = Arc::new(
            happy_script().reply("lead-model", Script::fail(ProviderError::Network("reset".into()))),
        );
        let pipeline = PlanPipeline::new(gateway_with(provider));

        let input: PlanState = serde_json::from_value(json!({
            "userId": "u1",
            "dailyPlan": {
                "nutrition": {"meals": ["stale"]},
                "mindfulness": {"session": "stale"}
            }
        }))
        .unwrap();
        let (state, trace) = pipeline.run_traced(input).await;

        assert_eq!(trace.failure().unwrap().node, PipelineNode::Lead);
        assert!(state.daily_plan().is_none());
        assert!(!state.is_complete());
    }

    #[tokio::test]
    async fn caller_supplied_nutrition_plan_does_not_shadow_model_output() {
        let provider = Arc::new(
            happy_script().reply("nutrition-model", Script::text(r#"{"meals": ["fresh"]}"#)),
        );
        let pipeline = PlanPipeline::new(gateway_with(provider));

        let input: PlanState = serde_json::from_value(json!({
            "userId": "u1",
            "nutritionPlan": {"meals": ["stale"]}
        }))
        .unwrap();
        let state = pipeline.run(input).await;

        assert_eq!(state.nutrition_plan(), Some(&json!({"meals": ["fresh"]})));
        assert_eq!(
            state.daily_plan().and_then(|plan| plan.nutrition.as_ref()),
            Some(&json!({"meals": ["fresh"]}))
        );
    }

    #[tokio::test]
    async fn professional_override_is_rendered_verbatim() {
        let provider = Arc::new(happy_script());
        let pipeline = PlanPipeline::new(gateway_with(provider.clone()));
        pipeline
            .run(alex().with_professional_override("No fasting; 3 meals minimum"))
            .await;

        assert!(provider.prompts_for("lead-model")[0].contains("No fasting; 3 meals minimum"));
        assert!(provider.prompts_for("nutrition-model")[0].contains("No fasting; 3 meals minimum"));
    }

    #[tokio::test]
    async fn lead_failure_stops_before_any_specialist() {
        let provider = Arc::new(
            happy_script().reply("lead-model", Script::fail(ProviderError::Network("reset".into()))),
        );
        let pipeline = PlanPipeline::new(gateway_with(provider.clone()));

        let (state, trace) = pipeline.run_traced(alex()).await;

        assert!(state.is_terminated());
        assert!(state.nutrition_plan().is_none());
        assert!(state.daily_plan().is_none());
        assert_eq!(trace.nodes(), vec![PipelineNode::Lead]);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn cbt_failure_keeps_nutrition_plan() {
        let provider = Arc::new(happy_script().reply(
            "cbt-model",
            Script::fail(ProviderError::ApiError {
                status_code: 500,
                message: "upstream".into(),
            }),
        ));
        let pipeline = PlanPipeline::new(gateway_with(provider));

        let (state, trace) = pipeline.run_traced(alex()).await;

        assert_eq!(state.nutrition_plan(), Some(&json!({"meals": ["oats", "salad"]})));
        assert!(state.cbt_task().is_none());
        assert!(state.daily_plan().is_none());
        assert!(state.is_terminated());
        let failed = trace.failure().unwrap();
        assert_eq!(failed.node, PipelineNode::Cbt);
    }

    #[tokio::test]
    async fn unparseable_reply_terminates_like_a_failed_call() {
        let provider = Arc::new(
            happy_script().reply("nutrition-model", Script::text("Here are some meal ideas!")),
        );
        let pipeline = PlanPipeline::new(gateway_with(provider.clone()));

        let (state, trace) = pipeline.run_traced(alex()).await;

        assert!(state.is_terminated());
        assert!(state.nutrition_plan().is_none());
        assert_eq!(provider.prompts_for("cbt-model").len(), 0);
        match &trace.failure().unwrap().outcome {
            Some(wellcoach_telemetry::StepOutcome::Failed { kind, .. }) => {
                assert_eq!(kind, "json_parse_failure")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminated_input_runs_nothing() {
        let provider = Arc::new(happy_script());
        let pipeline = PlanPipeline::new(gateway_with(provider.clone()));

        let input: PlanState =
            serde_json::from_value(json!({"userId": "u1", "nextAgent": "end"})).unwrap();
        let (state, trace) = pipeline.run_traced(input).await;

        assert!(state.is_terminated());
        assert!(trace.spans.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn step_timeout_is_an_invocation_failure() {
        let provider = Arc::new(happy_script().reply(
            "lead-model",
            Script::delayed(Duration::from_secs(600), r#"{"focus": "late"}"#),
        ));
        let pipeline = PlanPipeline::new(gateway_with(provider))
            .with_step_timeout(Some(Duration::from_secs(5)));

        let (state, trace) = pipeline.run_traced(alex()).await;

        assert!(state.is_terminated());
        match &trace.failure().unwrap().outcome {
            Some(wellcoach_telemetry::StepOutcome::Failed { kind, message }) => {
                assert_eq!(kind, "model_invocation_failure");
                assert!(message.contains("within 5s"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unmapped_agent_terminates_cleanly() {
        let provider = Arc::new(happy_script());
        let gateway = crate::test_helpers::gateway_for(
            provider,
            &[("lead_agent", "lead-model"), ("nutrition_agent", "nutrition-model")],
        );
        let (state, trace) = PlanPipeline::new(gateway).run_traced(alex()).await;

        assert!(state.nutrition_plan().is_some());
        assert!(state.cbt_task().is_none());
        match &trace.failure().unwrap().outcome {
            Some(wellcoach_telemetry::StepOutcome::Failed { kind, .. }) => {
                assert_eq!(kind, "unknown_agent")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
