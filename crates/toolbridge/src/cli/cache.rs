//! Schema cache CLI commands
//!
//! Inspects the durable (SQLite) schema cache configured in `cache`.

use argh::FromArgs;

use super::{load_config, Result};
use crate::config::CacheBackend;
use crate::schema::{open_store, SchemaEntry};

/// Inspect the schema cache
#[derive(FromArgs)]
#[argh(subcommand, name = "cache")]
pub struct CacheCommand {
    /// config file (default: ~/.toolbridge/config.yaml)
    #[argh(option, short = 'c')]
    config: Option<String>,

    #[argh(subcommand)]
    action: CacheAction,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum CacheAction {
    List(ListArgs),
    Remove(RemoveArgs),
}

/// List cached parameter schemas
#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
struct ListArgs {
    /// output format: table, json (default: table)
    #[argh(option, short = 'f', default = "String::from(\"table\")")]
    format: String,
}

/// Remove a cached schema
#[derive(FromArgs)]
#[argh(subcommand, name = "remove")]
struct RemoveArgs {
    /// tool identifier (TOOL_ID)
    #[argh(positional)]
    tool_id: String,
}

impl CacheCommand {
    pub async fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        if config.cache.backend == CacheBackend::Memory {
            eprintln!("Note: cache.backend is 'memory'; schemas are not kept between runs.");
        }
        let store = open_store(&config.cache)?;

        match self.action {
            CacheAction::List(args) => {
                let entries = store.list()?;
                if args.format == "json" {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    print_table(&entries);
                }
            }
            CacheAction::Remove(args) => {
                if store.remove(&args.tool_id)? {
                    println!("Removed cached schema for {}", args.tool_id);
                } else {
                    println!("No cached schema for {}", args.tool_id);
                }
            }
        }
        Ok(())
    }
}

fn print_table(entries: &[SchemaEntry]) {
    if entries.is_empty() {
        println!("No cached schemas.");
        return;
    }

    println!("{:<32} {:<28} {:<26} DESCRIPTION", "TOOL_ID", "GROUPS", "UPDATED");
    for entry in entries {
        println!(
            "{:<32} {:<28} {:<26} {}",
            entry.tool_id,
            groups_summary(entry),
            entry.updated_at.as_deref().unwrap_or("-"),
            entry.description.as_deref().unwrap_or("")
        );
    }
}

/// Comma-separated top-level keys of the template.
fn groups_summary(entry: &SchemaEntry) -> String {
    let keys: Vec<&str> = entry.template.as_map().keys().map(String::as_str).collect();
    if keys.is_empty() {
        "-".to_string()
    } else {
        keys.join(",")
    }
}
