use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{DatabaseManager, DynamicRepository, PgExecutor, SchemaCache};
use crate::registry::ModuleRegistry;

#[derive(Subcommand)]
pub enum SchemaCommands {
    #[command(about = "Show a module's columns and a sample of its rows")]
    Describe {
        #[arg(help = "Module name")]
        module: String,

        #[arg(long, default_value_t = 0, help = "Number of rows to include")]
        rows: i64,
    },
}

pub async fn handle(cmd: SchemaCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SchemaCommands::Describe { module, rows } => {
            let config = config();
            let registry = ModuleRegistry::from_config(config)?;
            let metadata = registry.lookup_by_module(&module)?;

            let pool = DatabaseManager::pool().await?;
            let executor = Arc::new(PgExecutor::new(pool, config.database.clone()));
            let schema = SchemaCache::new(executor.clone(), false).load(&metadata.schema_name).await?;

            let repository = DynamicRepository::new(schema.clone(), executor);
            let sample = if rows > 0 { repository.snapshot(rows).await? } else { vec![] };

            match output_format {
                OutputFormat::Json => {
                    let columns: Vec<_> = schema
                        .columns()
                        .iter()
                        .map(|c| json!({ "name": c.name, "type": c.pg_type }))
                        .collect();
                    output_json(
                        "schema",
                        json!({
                            "module": metadata.module_name,
                            "table": schema.name(),
                            "primary_key": schema.primary_key(),
                            "columns": columns,
                            "rows": sample,
                        }),
                    )
                }
                OutputFormat::Text => {
                    println!("Module: {}", metadata.module_name);
                    println!("Table:  {}", schema.name());
                    println!();
                    println!("{:<28} {:<14} {}", "COLUMN", "TYPE", "KEY");
                    println!("{}", "-".repeat(48));
                    for column in schema.columns() {
                        let key = if schema.primary_key() == Some(column.name.as_str()) { "PK" } else { "" };
                        println!("{:<28} {:<14} {}", column.name, column.pg_type, key);
                    }

                    if !sample.is_empty() {
                        let names = schema.column_names();
                        println!();
                        println!("{}", names.join(" | "));
                        for row in &sample {
                            let cells: Vec<String> = names.iter().map(|n| cell(&row[*n])).collect();
                            println!("{}", cells.join(" | "));
                        }
                    }
                    Ok(())
                }
            }
        }
    }
}
