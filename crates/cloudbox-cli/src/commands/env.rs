use anyhow::Result;
use cloudbox_core::api::validate_env_name;
use comfy_table::{Cell, Table};

use super::utils::parse_pairs;
use crate::cli::EnvCommands;
use crate::output::{OutputFormat, json::print_json, plain::print_rows, table::print_table};
use crate::setup::CliContext;

pub async fn run(ctx: &CliContext, command: EnvCommands, format: OutputFormat) -> Result<()> {
    match command {
        EnvCommands::List { id } => {
            let client = ctx.client().await?;
            let vars = client.envs().list(&id).await?;

            if format.is_json() {
                return print_json(&vars);
            }
            if format.is_plain() {
                return print_rows(vars.iter().map(|(k, v)| [k.as_str(), v.as_str()]));
            }

            if vars.is_empty() {
                println!("No environment variables set.");
                return Ok(());
            }
            let mut table = Table::new();
            table.set_header(vec!["Name", "Value"]);
            for (name, value) in &vars {
                table.add_row(vec![Cell::new(name), Cell::new(value)]);
            }
            print_table(table)
        }
        EnvCommands::Set { id, vars } => {
            let vars = parse_pairs(&vars)?;
            let client = ctx.client().await?;
            client.envs().set(&id, &vars).await?;

            if format.is_json() {
                return print_json(&serde_json::json!({ "set": vars.keys().collect::<Vec<_>>() }));
            }
            let names: Vec<&str> = vars.keys().map(String::as_str).collect();
            println!("Set {} on sandbox {id}", names.join(", "));
            Ok(())
        }
        EnvCommands::Unset { id, name } => {
            validate_env_name(&name)?;
            let client = ctx.client().await?;
            client.envs().unset(&id, &name).await?;

            if format.is_json() {
                return print_json(&serde_json::json!({ "unset": name }));
            }
            println!("Unset {name} on sandbox {id}");
            Ok(())
        }
    }
}
