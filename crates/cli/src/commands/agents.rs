//! `wellcoach agents`: Show how each agent resolves.

use wellcoach_core::agent::AgentRole;
use wellcoach_providers::{GatewayStatus, ModelGateway};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let gateway = ModelGateway::shared();

    println!("🤝 WellCoach Agents");
    println!("===================\n");

    match gateway.status() {
        GatewayStatus::Ready {
            source, skipped, ..
        } => {
            println!("  Gateway: ready ({source} configuration)\n");
            for s in &skipped {
                println!("  ⚠️  {} skipped: {}", s.agent, s.reason);
            }
        }
        GatewayStatus::Failed { reason } => {
            println!("  ❌ Gateway failed: {reason}\n");
        }
    }

    for role in AgentRole::ALL {
        match gateway.resolve(role.config_key()) {
            Ok(client) => println!(
                "  ✅ {:<16} → {}/{} (temperature {})",
                role.config_key(),
                client.provider_name(),
                client.model(),
                client.temperature()
            ),
            Err(e) => println!("  ❌ {:<16} {e}", role.config_key()),
        }
    }
    println!();

    Ok(())
}
