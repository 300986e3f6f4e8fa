// This is the entry point of the script host moderation tool.
//
// **Architecture Overview:**
// - `core/` = Business logic (metadata parsing, classification, moderation)
// - `infra/` = Implementations of core traits (SQLite, JSON policy file)
// - `cli/` = Command-line adapter (argument parsing, output)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize stores and the moderation service (dependency injection)
// 3. Hand the parsed command to the CLI layer

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "cli/cli_layer.rs"]
mod cli;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::cli::{AppConfig, Cli};
use crate::core::moderation::ModerationService;
use crate::infra::moderation::{SqliteAccountStore, SqliteScriptStore};
use crate::infra::policy::JsonPolicyStore;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    // Keep runtime data in a dedicated folder so the repo root stays tidy.
    std::fs::create_dir_all(&config.data_dir)?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let pool = SqlitePoolOptions::new()
        .connect(&format!(
            "sqlite://{}?mode=rwc",
            config.database_path.display()
        ))
        .await?;

    let account_store = SqliteAccountStore::new(pool.clone());
    account_store.migrate().await?;

    let script_store = SqliteScriptStore::new(pool);
    script_store.migrate().await?;

    // An unreadable policy file is not fatal here: the service refuses to
    // moderate anything until it is fixed.
    let policy_store = JsonPolicyStore::new(&config.policy_path);

    let app = ModerationService::new(account_store, script_store, policy_store);

    tracing::debug!(
        database = %config.database_path.display(),
        policy = %config.policy_path.display(),
        "Services initialized"
    );

    cli::run(cli, &app, &config).await
}
