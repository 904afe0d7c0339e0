use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::registry::ModuleRegistry;
use crate::types::Verb;

#[derive(Subcommand)]
pub enum ModuleCommands {
    #[command(about = "List registered modules and their verbs")]
    List,
}

pub async fn handle(cmd: ModuleCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ModuleCommands::List => {
            let registry = ModuleRegistry::from_config(config())?;
            let modules: Vec<_> = registry.modules().collect();
            if modules.is_empty() {
                return output_empty_collection(&output_format, "modules", "No modules registered");
            }

            match output_format {
                OutputFormat::Json => {
                    let modules: Vec<_> = modules
                        .iter()
                        .map(|m| {
                            json!({
                                "module": m.module_name,
                                "schema": m.schema_name,
                                "verbs": m.allowed_verbs,
                            })
                        })
                        .collect();
                    output_json("modules", json!(modules))
                }
                OutputFormat::Text => {
                    println!("{:<20} {:<24} {}", "MODULE", "TABLE", "VERBS");
                    println!("{}", "-".repeat(64));
                    for m in modules {
                        let verbs: Vec<&str> = m.allowed_verbs.iter().map(Verb::as_str).collect();
                        println!("{:<20} {:<24} {}", m.module_name, m.schema_name, verbs.join(","));
                    }
                    Ok(())
                }
            }
        }
    }
}
