use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ProfileCommands;
use crate::output::{OutputFormat, json::print_json, plain::print_rows, table::print_table};
use crate::setup::CliContext;

pub fn run(ctx: &CliContext, command: ProfileCommands, format: OutputFormat) -> Result<()> {
    match command {
        ProfileCommands::List => list(ctx, format),
        ProfileCommands::Create { name } => create(ctx, &name, format),
        ProfileCommands::Use { name } => use_profile(ctx, &name, format),
        ProfileCommands::Delete { name } => delete(ctx, &name, format),
    }
}

#[derive(Serialize)]
struct ProfileRow {
    name: String,
    active: bool,
    base_url: Option<String>,
    default_template: Option<String>,
}

fn list(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let rows: Vec<ProfileRow> = ctx
        .config
        .profile_names()
        .into_iter()
        .map(|name| {
            let settings = ctx.config.profile(&name);
            ProfileRow {
                active: name == ctx.config.active_profile,
                base_url: settings.and_then(|s| s.base_url.clone()),
                default_template: settings.and_then(|s| s.default_template.clone()),
                name,
            }
        })
        .collect();

    if format.is_json() {
        return print_json(&rows);
    }
    if format.is_plain() {
        return print_rows(rows.iter().map(|row| {
            [
                row.name.as_str(),
                if row.active { "active" } else { "" },
            ]
        }));
    }

    let mut table = Table::new();
    table.set_header(vec!["", "Name", "Base URL", "Default template"]);
    for row in &rows {
        table.add_row(vec![
            Cell::new(if row.active { "*" } else { "" }),
            Cell::new(&row.name),
            Cell::new(row.base_url.as_deref().unwrap_or("-")),
            Cell::new(row.default_template.as_deref().unwrap_or("-")),
        ]);
    }
    print_table(table)
}

fn create(ctx: &CliContext, name: &str, format: OutputFormat) -> Result<()> {
    let mut config = ctx.config.clone();
    config.create_profile(name)?;
    config.save().context("failed to save configuration")?;
    info!(profile = name, "Created profile");

    if format.is_json() {
        return print_json(&serde_json::json!({ "created": name }));
    }
    println!("Created profile '{name}'");
    Ok(())
}

fn use_profile(ctx: &CliContext, name: &str, format: OutputFormat) -> Result<()> {
    let mut config = ctx.config.clone();
    config.use_profile(name)?;
    config.save().context("failed to save configuration")?;

    if format.is_json() {
        return print_json(&serde_json::json!({ "active_profile": name }));
    }
    println!("Active profile is now '{name}'");
    Ok(())
}

fn delete(ctx: &CliContext, name: &str, format: OutputFormat) -> Result<()> {
    let mut config = ctx.config.clone();
    config.delete_profile(name)?;
    config.save().context("failed to save configuration")?;

    if let Err(e) = ctx.credentials().delete(name) {
        warn!(profile = name, error = %e, "Failed to remove stored credentials");
    }

    if format.is_json() {
        return print_json(&serde_json::json!({
            "deleted": name,
            "active_profile": config.active_profile,
        }));
    }
    println!("Deleted profile '{name}'");
    if config.active_profile != ctx.config.active_profile {
        println!("Active profile is now '{}'", config.active_profile);
    }
    Ok(())
}
