//! `wellcoach onboard`: First-time setup.

use wellcoach_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();

    println!("🌱 WellCoach First-Time Setup");
    println!("===============================\n");

    if let Some(config_dir) = config_path.parent() {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
            println!("✅ Created config directory: {}", config_dir.display());
        } else {
            println!("  Config directory exists: {}", config_dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Export OPENAI_API_KEY and ANTHROPIC_API_KEY (or edit the api_key entries)");
    println!("   2. Run: wellcoach doctor");
    println!("   3. Run: wellcoach plan --user-id me\n");

    Ok(())
}
