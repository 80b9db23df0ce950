//! `wellcoach plan`: Run the agent pipeline once.

use std::io::Read;
use std::path::PathBuf;

use serde_json::Map;
use tracing::warn;
use wellcoach_agent::PlanPipeline;
use wellcoach_config::{AppConfig, PipelineConfig};
use wellcoach_core::plan::PlanState;
use wellcoach_providers::ModelGateway;

pub async fn run(
    input: Option<PathBuf>,
    user_id: Option<String>,
    show_trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = read_state(input, user_id)?;

    let pipeline_config = match AppConfig::load() {
        Ok(config) => config.pipeline,
        Err(e) => {
            warn!(error = %e, "Using default pipeline settings");
            PipelineConfig::default()
        }
    };

    let pipeline = PlanPipeline::from_config(ModelGateway::shared(), &pipeline_config);
    let (state, trace) = pipeline.run_traced(state).await;

    println!("{}", serde_json::to_string_pretty(&state)?);

    if show_trace {
        eprintln!("{}", serde_json::to_string_pretty(&trace)?);
    }

    if !state.is_complete() {
        let step = trace
            .failure()
            .map(|s| s.node.to_string())
            .unwrap_or_else(|| "unknown".into());
        eprintln!("⚠️  Plan partially generated (stopped at step: {step}). Run `wellcoach doctor` for details.");
    }

    Ok(())
}

fn read_state(
    input: Option<PathBuf>,
    user_id: Option<String>,
) -> Result<PlanState, Box<dyn std::error::Error>> {
    let text = match (&input, &user_id) {
        (Some(path), _) if path.as_os_str() != "-" => Some(std::fs::read_to_string(path)?),
        (None, Some(_)) => None,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Some(buf)
        }
    };

    parse_state(text.as_deref(), user_id)
}

/// Build the initial Plan State from JSON text, a user id, or both.
fn parse_state(
    text: Option<&str>,
    user_id: Option<String>,
) -> Result<PlanState, Box<dyn std::error::Error>> {
    let mut state = match text {
        Some(json) => serde_json::from_str::<PlanState>(json)?,
        None => PlanState::new(String::new(), Map::new()),
    };

    if let Some(id) = user_id {
        state.user_id = id;
    }
    if state.user_id.trim().is_empty() {
        return Err("a Plan State needs a userId (pass --user-id or include it in the input)".into());
    }

    Ok(state)
}
