use anyhow::Result;
use cloudbox_core::api::{CreateSandbox, Sandbox};
use comfy_table::{Cell, Table};
use tracing::info;

use super::utils::{format_bytes, format_datetime, or_dash, parse_pairs, parse_state};
use crate::cli::SandboxCommands;
use crate::output::table::{key_value_table, print_table};
use crate::output::{OutputFormat, json::print_json, plain::print_rows};
use crate::setup::CliContext;

pub async fn run(ctx: &CliContext, command: SandboxCommands, format: OutputFormat) -> Result<()> {
    match command {
        SandboxCommands::Create {
            template,
            timeout,
            metadata,
            env,
        } => create(ctx, template, timeout, &metadata, &env, format).await,
        SandboxCommands::List { state } => list(ctx, state.as_deref(), format).await,
        SandboxCommands::Info { id } => info_cmd(ctx, &id, format).await,
        SandboxCommands::Pause { id } => pause(ctx, &id, format).await,
        SandboxCommands::Resume { id } => resume(ctx, &id, format).await,
        SandboxCommands::Kill { id } => kill(ctx, &id, format).await,
        SandboxCommands::Health { id } => health(ctx, &id, format).await,
        SandboxCommands::Metrics { id } => metrics(ctx, &id, format).await,
    }
}

async fn create(
    ctx: &CliContext,
    template: Option<String>,
    timeout: Option<u64>,
    metadata: &[String],
    env: &[String],
    format: OutputFormat,
) -> Result<()> {
    let params = CreateSandbox {
        template: template.or(ctx.resolved()?.default_template),
        timeout,
        metadata: parse_pairs(metadata)?,
        env_vars: parse_pairs(env)?,
    };

    let client = ctx.client().await?;
    let sandbox = client.sandboxes().create(&params).await?;
    info!(sandbox = %sandbox.id, "Created sandbox");

    if format.is_json() {
        return print_json(&sandbox);
    }
    if format.is_plain() {
        println!("{}", sandbox.id);
        return Ok(());
    }

    println!("Created sandbox {}", sandbox.id);
    print_table(sandbox_details(&sandbox))
}

async fn list(ctx: &CliContext, state: Option<&str>, format: OutputFormat) -> Result<()> {
    let state = state.map(parse_state).transpose()?;
    let client = ctx.client().await?;
    let sandboxes = client.sandboxes().list(state).await?;

    if format.is_json() {
        return print_json(&sandboxes);
    }
    if format.is_plain() {
        return print_rows(sandboxes.iter().map(|sb| {
            [
                sb.id.clone(),
                sb.state.to_string(),
                sb.template.clone().unwrap_or_default(),
            ]
        }));
    }

    if sandboxes.is_empty() {
        println!("No sandboxes found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "State", "Template", "Started", "Ends"]);
    for sb in &sandboxes {
        table.add_row(vec![
            Cell::new(&sb.id),
            Cell::new(sb.state),
            Cell::new(sb.template.as_deref().unwrap_or("-")),
            Cell::new(format_datetime(sb.started_at)),
            Cell::new(format_datetime(sb.end_at)),
        ]);
    }
    print_table(table)
}

fn sandbox_details(sb: &Sandbox) -> Table {
    let mut rows = vec![
        ("ID", sb.id.clone()),
        ("State", sb.state.to_string()),
        ("Template", or_dash(sb.template.clone())),
        ("Started", format_datetime(sb.started_at)),
        ("Ends", format_datetime(sb.end_at)),
        ("CPUs", or_dash(sb.cpu_count)),
        (
            "Memory",
            or_dash(sb.memory_mb.map(|mb| format_bytes(mb * 1024 * 1024))),
        ),
    ];
    for (key, value) in &sb.metadata {
        rows.push(("Metadata", format!("{key}={value}")));
    }
    key_value_table(rows)
}

async fn info_cmd(ctx: &CliContext, id: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    let sandbox = client.sandboxes().get(id).await?;

    if format.is_json() {
        return print_json(&sandbox);
    }
    if format.is_plain() {
        return print_rows([[sandbox.id.clone(), sandbox.state.to_string()]]);
    }
    print_table(sandbox_details(&sandbox))
}

async fn pause(ctx: &CliContext, id: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    client.sandboxes().pause(id).await?;

    if format.is_json() {
        return print_json(&serde_json::json!({ "id": id, "state": "paused" }));
    }
    println!("Paused sandbox {id}");
    Ok(())
}

async fn resume(ctx: &CliContext, id: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    let sandbox = client.sandboxes().resume(id).await?;

    if format.is_json() {
        return print_json(&sandbox);
    }
    println!("Resumed sandbox {} ({})", sandbox.id, sandbox.state);
    Ok(())
}

async fn kill(ctx: &CliContext, id: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    client.sandboxes().kill(id).await?;
    info!(sandbox = id, "Killed sandbox");

    if format.is_json() {
        return print_json(&serde_json::json!({ "id": id, "killed": true }));
    }
    println!("Killed sandbox {id}");
    Ok(())
}

async fn health(ctx: &CliContext, id: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    let health = client.sandboxes().health(id).await?;

    if format.is_json() {
        return print_json(&health);
    }
    if format.is_plain() {
        let mut rows = vec![["status".to_string(), health.status.clone()]];
        rows.extend(health.checks.iter().map(|(k, v)| [k.clone(), v.clone()]));
        return print_rows(rows);
    }

    let verdict = if health.is_healthy() { "healthy" } else { "unhealthy" };
    println!("Sandbox {id} is {verdict} ({})", health.status);
    if health.checks.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Check", "Result"]);
    for (check, result) in &health.checks {
        table.add_row(vec![Cell::new(check), Cell::new(result)]);
    }
    print_table(table)
}

async fn metrics(ctx: &CliContext, id: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    let samples = client.sandboxes().metrics(id).await?;

    if format.is_json() {
        return print_json(&samples);
    }
    if format.is_plain() {
        return print_rows(samples.iter().map(|s| {
            [
                s.timestamp.to_rfc3339(),
                format!("{:.1}", s.cpu_pct),
                s.memory_used_bytes.to_string(),
                s.memory_total_bytes.to_string(),
            ]
        }));
    }

    if samples.is_empty() {
        println!("No metrics recorded yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Time", "CPU %", "Memory", "Disk"]);
    for s in &samples {
        table.add_row(vec![
            Cell::new(format_datetime(Some(s.timestamp))),
            Cell::new(format!("{:.1}", s.cpu_pct)),
            Cell::new(format!(
                "{} / {}",
                format_bytes(s.memory_used_bytes),
                format_bytes(s.memory_total_bytes)
            )),
            Cell::new(or_dash(s.disk_used_bytes.map(format_bytes))),
        ]);
    }
    print_table(table)
}
