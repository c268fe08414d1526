use anyhow::{Result, bail};
use cloudbox_core::api::{BuildState, StartBuild, pack_context};
use comfy_table::{Cell, Table};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::utils::{format_bytes, format_datetime, or_dash};
use crate::cli::TemplateCommands;
use crate::output::{OutputFormat, json::print_json, plain::print_rows, table::print_table};
use crate::setup::CliContext;

const BUILD_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub async fn run(ctx: &CliContext, command: TemplateCommands, format: OutputFormat) -> Result<()> {
    match command {
        TemplateCommands::List => list(ctx, format).await,
        TemplateCommands::Build {
            path,
            name,
            template_id,
            dockerfile,
            start_cmd,
            cpu,
            memory_mb,
        } => {
            let params = StartBuild {
                template_id,
                name,
                dockerfile,
                start_cmd,
                cpu_count: cpu,
                memory_mb,
            };
            build(ctx, &path, params, format).await
        }
        TemplateCommands::Delete { id } => delete(ctx, &id, format).await,
    }
}

async fn list(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    let templates = client.templates().list().await?;

    if format.is_json() {
        return print_json(&templates);
    }
    if format.is_plain() {
        return print_rows(templates.iter().map(|t| {
            [
                t.id.clone(),
                t.name.clone().unwrap_or_default(),
                t.build_status.clone().unwrap_or_default(),
            ]
        }));
    }

    if templates.is_empty() {
        println!("No templates found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Status", "CPUs", "Memory MB", "Public", "Created"]);
    for t in &templates {
        table.add_row(vec![
            Cell::new(&t.id),
            Cell::new(t.name.as_deref().unwrap_or("-")),
            Cell::new(t.build_status.as_deref().unwrap_or("-")),
            Cell::new(or_dash(t.cpu_count)),
            Cell::new(or_dash(t.memory_mb)),
            Cell::new(if t.public { "yes" } else { "no" }),
            Cell::new(format_datetime(t.created_at)),
        ]);
    }
    print_table(table)
}

async fn build(ctx: &CliContext, path: &Path, params: StartBuild, format: OutputFormat) -> Result<()> {
    let context = pack_context(path)?;
    eprintln!(
        "Packed build context {} ({})",
        path.display(),
        format_bytes(context.len() as u64)
    );

    let client = ctx.client().await?;
    let templates = client.templates();
    let build = templates.start_build(&params).await?;
    info!(template = %build.template_id, build = %build.build_id, "Started template build");

    templates.upload_context(&build, context).await?;
    eprintln!(
        "Building template {} (build {})...",
        build.template_id, build.build_id
    );

    // Build logs go to stderr so JSON output stays parseable
    let status = templates
        .wait_for_build(&build, BUILD_POLL_INTERVAL, |line| eprintln!("{line}"))
        .await?;

    if format.is_json() {
        print_json(&status)?;
    }
    if status.status == BuildState::Error {
        bail!(
            "template build {} failed: {}",
            status.build_id,
            status.reason.as_deref().unwrap_or("no reason given")
        );
    }
    if !format.is_json() {
        println!("Template {} is ready", status.template_id);
    }
    Ok(())
}

async fn delete(ctx: &CliContext, id: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    client.templates().delete(id).await?;

    if format.is_json() {
        return print_json(&serde_json::json!({ "id": id, "deleted": true }));
    }
    println!("Deleted template {id}");
    Ok(())
}
