// Command definitions and handlers.

use super::config::AppConfig;
use crate::core::metadata::ScriptLanguage;
use crate::core::moderation::{
    Account, AccountStore, ModerationService, PolicySource, SubmissionRequest, SubmitResult,
    Verdict,
};
use crate::core::submission::{PendingClassification, SubmissionKind, SubmittedCode, UserFields};
use crate::infra::moderation::{SqliteAccountStore, SqliteScriptStore};
use crate::infra::policy::JsonPolicyStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The service as wired up by main.
pub type App = ModerationService<SqliteAccountStore, SqliteScriptStore, JsonPolicyStore>;

#[derive(Parser)]
#[command(name = "scripthost", about = "Moderate userscript and userstyle submissions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit code on behalf of an account
    Submit {
        #[arg(long)]
        account: u64,
        /// File containing the code
        #[arg(long)]
        code: PathBuf,
        #[arg(long, default_value = "js")]
        language: ScriptLanguage,
        /// Post as a library (may omit the metadata block)
        #[arg(long)]
        library: bool,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Post as a new version of this script
        #[arg(long)]
        script_id: Option<u64>,
    },
    /// Name a library that `submit` left pending
    CompleteIdentity {
        #[arg(long)]
        account: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        script_id: Option<u64>,
    },
    #[command(subcommand)]
    Account(AccountCommand),
    #[command(subcommand)]
    Policy(PolicyCommand),
}

#[derive(Subcommand)]
pub enum AccountCommand {
    /// Create or update an account
    Add {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        email: String,
        #[arg(long)]
        confirmed: bool,
        #[arg(long)]
        disposable: bool,
        #[arg(long, default_value_t = 0)]
        trust_level: u32,
    },
    /// Show an account and whether it may post
    Show {
        #[arg(long)]
        id: u64,
    },
}

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Load the policy file and summarize it
    Check,
}

pub async fn run(cli: Cli, app: &App, config: &AppConfig) -> Result<()> {
    match cli.command {
        Command::Submit {
            account,
            code,
            language,
            library,
            name,
            description,
            script_id,
        } => {
            let text = std::fs::read_to_string(&code)
                .with_context(|| format!("Failed to read {}", code.display()))?;

            let request = SubmissionRequest {
                account_id: account,
                code: SubmittedCode::new(text, language),
                kind: if library {
                    SubmissionKind::Library
                } else {
                    SubmissionKind::Script
                },
                user_fields: UserFields { name, description },
                script_id,
            };

            let result = app.submit(request).await?;
            report(result, account, config)
        }

        Command::CompleteIdentity {
            account,
            name,
            description,
            script_id,
        } => {
            let path = config.pending_path(account);
            let file = std::fs::File::open(&path)
                .with_context(|| format!("No pending library for account {}", account))?;
            let pending: PendingClassification = serde_json::from_reader(file)
                .with_context(|| format!("Corrupt pending submission at {}", path.display()))?;

            let user_fields = UserFields {
                name: Some(name),
                description,
            };
            let result = app
                .complete_identity(account, pending, user_fields, script_id)
                .await?;

            if let SubmitResult::Completed(_) = &result {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
            report(result, account, config)
        }

        Command::Account(AccountCommand::Add {
            id,
            email,
            confirmed,
            disposable,
            trust_level,
        }) => {
            let account = Account {
                id,
                email,
                email_confirmed: confirmed,
                disposable_email: disposable,
                banned: false,
                trust_level,
            };
            app.accounts().upsert_account(&account).await?;
            println!("Saved account {}", id);
            Ok(())
        }

        Command::Account(AccountCommand::Show { id }) => {
            let account = app
                .accounts()
                .get_account(id)
                .await?
                .with_context(|| format!("Account {} not found", id))?;

            println!(
                "Account {}: {} (confirmed: {}, disposable: {}, banned: {}, trust: {})",
                account.id,
                account.email,
                account.email_confirmed,
                account.disposable_email,
                account.banned,
                account.trust_level
            );

            match app.check_account(id).await? {
                Verdict::Accept => println!("May post scripts."),
                Verdict::Reject { reason } | Verdict::RejectAndBan { reason } => {
                    println!("May not post scripts: {}", reason)
                }
            }
            Ok(())
        }

        Command::Policy(PolicyCommand::Check) => {
            app.policy().reload().await?;
            let policy = app.policy().snapshot().await?;
            println!("Policy loaded from {}", config.policy_path.display());
            println!(
                "  disposable domains: {}",
                policy.disposable_email_domains.len()
            );
            println!("  blocked domains:    {}", policy.blocked_email_domains.len());
            println!("  copied-code rules:  {}", policy.copied_code.len());
            println!("  fingerprints:       {}", policy.fingerprints.len());
            println!("  disallowed:         {}", policy.disallowed.len());
            Ok(())
        }
    }
}

fn report(result: SubmitResult, account_id: u64, config: &AppConfig) -> Result<()> {
    match result {
        SubmitResult::Completed(outcome) => println!("{}", outcome),
        SubmitResult::NeedsIdentity(pending) => {
            let path = config.pending_path(account_id);
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            serde_json::to_writer_pretty(file, &pending)?;

            println!(
                "This library has no metadata block. Give it a name with:\n  \
                 scripthost complete-identity --account {} --name <NAME> [--description <TEXT>]",
                account_id
            );
        }
    }
    Ok(())
}
