use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{AccessLevel, PgApiKeyStore};
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::services::{parse_expiry, ApiKeyService};

#[derive(Subcommand)]
pub enum KeyCommands {
    #[command(about = "Create the api_keys table if it does not exist")]
    Init,

    #[command(about = "Generate a new API key")]
    Generate {
        #[arg(long, help = "Free-form label")]
        label: Option<String>,

        #[arg(long, help = "Expiry as RFC 3339 or YYYY-MM-DD")]
        expires_at: String,

        #[arg(long, help = "read, update, read-update or delete")]
        access: AccessLevel,

        #[arg(long, help = "Create the key disabled")]
        inactive: bool,
    },

    #[command(about = "List API keys (secrets are shown as fingerprints)")]
    List,

    #[command(about = "Activate or deactivate a key; expired keys need --expires-at")]
    Toggle {
        #[arg(help = "Key id")]
        id: i32,

        #[arg(long, help = "Reactivate with this expiry (RFC 3339 or YYYY-MM-DD)")]
        expires_at: Option<String>,
    },

    #[command(about = "Delete a key")]
    Delete {
        #[arg(help = "Key id")]
        id: i32,
    },
}

pub async fn handle(cmd: KeyCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool().await?;
    let store = Arc::new(PgApiKeyStore::new(pool));

    let service = ApiKeyService::new(store.clone());

    match cmd {
        KeyCommands::Init => {
            store.ensure_table().await?;
            output_success(&output_format, "api_keys table ready", None)
        }
        KeyCommands::Generate { label, expires_at, access, inactive } => {
            let expires_at = parse_expiry(&expires_at)?;
            let record = service.generate(label, expires_at, access, !inactive).await?;

            // The secret is printed once, here, and never again
            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "API key created",
                    Some(json!({
                        "id": record.id,
                        "key": record.key,
                        "access": record.access,
                        "expires_at": record.expires_at,
                        "is_active": record.is_active,
                    })),
                ),
                OutputFormat::Text => {
                    println!("✓ API key created (id {})", record.id);
                    println!("Key:     {}", record.key);
                    println!("Access:  {}", record.access);
                    println!("Expires: {}", record.expires_at.format("%Y-%m-%d %H:%M"));
                    if !record.is_active {
                        println!("Status:  inactive");
                    }
                    Ok(())
                }
            }
        }
        KeyCommands::List => {
            let keys = service.list().await?;
            if keys.is_empty() {
                return output_empty_collection(&output_format, "keys", "No API keys");
            }

            match output_format {
                OutputFormat::Json => output_json("keys", serde_json::to_value(&keys)?),
                OutputFormat::Text => {
                    let now = Utc::now();
                    println!("{:<6} {:<14} {:<12} {:<9} {:<18} {}", "ID", "FINGERPRINT", "ACCESS", "STATUS", "EXPIRES", "LABEL");
                    println!("{}", "-".repeat(80));
                    for key in &keys {
                        let status = match (key.is_active, key.expires_at <= now) {
                            (false, _) => "inactive",
                            (true, true) => "expired",
                            (true, false) => "active",
                        };
                        println!(
                            "{:<6} {:<14} {:<12} {:<9} {:<18} {}",
                            key.id,
                            key.fingerprint,
                            key.access,
                            status,
                            key.expires_at.format("%Y-%m-%d %H:%M"),
                            key.label.as_deref().unwrap_or("")
                        );
                    }
                    Ok(())
                }
            }
        }
        KeyCommands::Toggle { id, expires_at } => {
            let key = match expires_at {
                Some(raw) => service.reactivate(id, parse_expiry(&raw)?).await?,
                None => service.toggle(id).await?,
            };
            let state = if key.is_active { "activated" } else { "deactivated" };
            output_success(
                &output_format,
                &format!("API key {} {}", id, state),
                Some(json!({ "id": id, "is_active": key.is_active, "expires_at": key.expires_at })),
            )
        }
        KeyCommands::Delete { id } => {
            service.delete(id).await?;
            output_success(&output_format, &format!("API key {} deleted", id), Some(json!({ "id": id })))
        }
    }
}
