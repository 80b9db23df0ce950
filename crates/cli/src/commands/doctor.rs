//! `wellcoach doctor`: Diagnose configuration health.

use wellcoach_config::{AppConfig, ModelConfig};
use wellcoach_providers::{GatewayStatus, ModelGateway};

pub async fn run(ping: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 WellCoach Doctor: Configuration Diagnostics");
    println!("==============================================\n");

    let mut issues = 0;
    let lookup = |var: &str| std::env::var(var).ok();

    // Check config
    let config_path = AppConfig::config_path();
    let models = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid: {}", config_path.display());
                config.models
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                issues += 1;
                ModelConfig::fallback()
            }
        }
    } else {
        println!("  ⚠️  No config file at {}, run `wellcoach onboard`", config_path.display());
        issues += 1;
        ModelConfig::fallback()
    };

    // Check key references
    let unresolved = models.unresolved_env_refs(&lookup);
    if unresolved.is_empty() {
        println!("  ✅ All API key references resolve");
    } else {
        for var in &unresolved {
            println!("  ⚠️  Environment variable {var} is not set");
        }
        issues += unresolved.len();
    }

    // Check gateway
    let gateway = ModelGateway::shared();
    match gateway.status() {
        GatewayStatus::Ready {
            source,
            agents,
            skipped,
        } => {
            println!("  ✅ Model gateway ready ({source}): {}", agents.join(", "));
            for s in &skipped {
                println!("  ⚠️  {} skipped: {}", s.agent, s.reason);
                issues += 1;
            }
        }
        GatewayStatus::Failed { reason } => {
            println!("  ❌ Model gateway failed: {reason}");
            issues += 1;
        }
    }

    if ping {
        for client in gateway.clients() {
            match client.health_check().await {
                Ok(true) => println!("  ✅ {} reachable ({})", client.agent(), client.provider_name()),
                Ok(false) => {
                    println!("  ❌ {} rejected by {}", client.agent(), client.provider_name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ {} unreachable: {e}", client.agent());
                    issues += 1;
                }
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
