use anyhow::{Context, Result};
use cloudbox_core::config::ConfigKey;
use cloudbox_core::paths;
use comfy_table::{Cell, Table};

use crate::cli::ConfigCommands;
use crate::output::{OutputFormat, json::print_json, plain::print_rows, table::print_table};
use crate::setup::CliContext;

pub fn run(ctx: &CliContext, command: ConfigCommands, format: OutputFormat) -> Result<()> {
    match command {
        ConfigCommands::List => list(ctx, format),
        ConfigCommands::Get { key } => get(ctx, &key, format),
        ConfigCommands::Set { key, value } => set(ctx, &key, &value, format),
        ConfigCommands::Unset { key } => unset(ctx, &key, format),
        ConfigCommands::Path => path(format),
    }
}

fn list(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let resolved = ctx.resolved()?;
    let timeout = resolved.timeout.as_secs().to_string();
    let template = resolved.default_template.clone().unwrap_or_default();
    let output = resolved.output.to_string();

    let rows = [
        (ConfigKey::BaseUrl, resolved.base_url.as_str()),
        (ConfigKey::DefaultTemplate, template.as_str()),
        (ConfigKey::Timeout, timeout.as_str()),
        (ConfigKey::Output, output.as_str()),
    ];

    if format.is_json() {
        return print_json(&serde_json::json!({
            "profile": resolved.profile,
            "base_url": resolved.base_url,
            "default_template": resolved.default_template,
            "timeout": resolved.timeout.as_secs(),
            "output": output,
        }));
    }
    if format.is_plain() {
        return print_rows(rows.iter().map(|(key, value)| [key.as_str(), *value]));
    }

    let mut table = Table::new();
    table.set_header(vec!["Key", "Value", "Set in profile"]);
    for (key, value) in rows {
        let explicit = ctx.config.get(&resolved.profile, key).is_some();
        table.add_row(vec![
            Cell::new(key.as_str()),
            Cell::new(if value.is_empty() { "-" } else { value }),
            Cell::new(if explicit { "yes" } else { "no" }),
        ]);
    }
    println!("Profile: {}", resolved.profile);
    print_table(table)
}

fn get(ctx: &CliContext, key: &str, format: OutputFormat) -> Result<()> {
    let key: ConfigKey = key.parse()?;
    let profile = ctx.profile()?;
    let value = ctx.config.get(&profile, key);

    if format.is_json() {
        return print_json(&serde_json::json!({
            "profile": profile,
            "key": key.as_str(),
            "value": value,
        }));
    }

    match value {
        Some(value) => println!("{value}"),
        None if format.is_plain() => {}
        None => println!("{key} is not set for profile '{profile}'"),
    }
    Ok(())
}

fn set(ctx: &CliContext, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let key: ConfigKey = key.parse()?;
    let profile = ctx.profile()?;
    let mut config = ctx.config.clone();
    config.set(&profile, key, value)?;
    config.save().context("failed to save configuration")?;

    let stored = config.get(&profile, key).unwrap_or_default();
    if format.is_json() {
        return print_json(&serde_json::json!({
            "profile": profile,
            "key": key.as_str(),
            "value": stored,
        }));
    }

    println!("Set {key} = {stored} (profile: {profile})");
    Ok(())
}

fn unset(ctx: &CliContext, key: &str, format: OutputFormat) -> Result<()> {
    let key: ConfigKey = key.parse()?;
    let profile = ctx.profile()?;
    let mut config = ctx.config.clone();
    let removed = config.unset(&profile, key);
    if removed {
        config.save().context("failed to save configuration")?;
    }

    if format.is_json() {
        return print_json(&serde_json::json!({
            "profile": profile,
            "key": key.as_str(),
            "removed": removed,
        }));
    }

    if removed {
        println!("Unset {key} (profile: {profile})");
    } else {
        println!("{key} was not set for profile '{profile}'");
    }
    Ok(())
}

fn path(format: OutputFormat) -> Result<()> {
    let path = paths::config_path()?;
    if format.is_json() {
        return print_json(&serde_json::json!({ "path": path }));
    }
    println!("{}", path.display());
    Ok(())
}
