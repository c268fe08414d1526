use anyhow::{Context, Result};
use cloudbox_core::api::{EntryInfo, EntryKind};
use comfy_table::{Cell, Table};
use std::io::{Read, Write};
use std::path::Path;

use super::utils::{format_bytes, format_datetime, or_dash};
use crate::cli::FilesCommands;
use crate::output::{OutputFormat, json::print_json, plain::print_rows, table::print_table};
use crate::setup::CliContext;

pub async fn run(ctx: &CliContext, command: FilesCommands, format: OutputFormat) -> Result<()> {
    match command {
        FilesCommands::Ls { id, path } => list(ctx, &id, &path, format).await,
        FilesCommands::Cat { id, path } => cat(ctx, &id, &path).await,
        FilesCommands::Write { id, path, from } => {
            write(ctx, &id, &path, from.as_deref(), format).await
        }
        FilesCommands::Rm { id, path } => remove(ctx, &id, &path, format).await,
        FilesCommands::Mkdir { id, path } => make_dir(ctx, &id, &path, format).await,
    }
}

fn kind_label(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "file",
        EntryKind::Dir => "dir",
        EntryKind::Symlink => "symlink",
    }
}

async fn list(ctx: &CliContext, id: &str, path: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    let mut entries: Vec<EntryInfo> = client.files().list(id, path).await?;
    entries.sort_by(|a, b| {
        (a.kind != EntryKind::Dir)
            .cmp(&(b.kind != EntryKind::Dir))
            .then_with(|| a.name.cmp(&b.name))
    });

    if format.is_json() {
        return print_json(&entries);
    }
    if format.is_plain() {
        return print_rows(entries.iter().map(|e| {
            [
                kind_label(e.kind).to_string(),
                e.size.map(|s| s.to_string()).unwrap_or_default(),
                e.path.clone(),
            ]
        }));
    }

    if entries.is_empty() {
        println!("{path} is empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Type", "Size", "Modified"]);
    for entry in &entries {
        let name = match entry.kind {
            EntryKind::Dir => format!("{}/", entry.name),
            _ => entry.name.clone(),
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(kind_label(entry.kind)),
            Cell::new(or_dash(entry.size.map(format_bytes))),
            Cell::new(format_datetime(entry.modified_at)),
        ]);
    }
    print_table(table)
}

/// Raw bytes go straight to stdout regardless of format.
async fn cat(ctx: &CliContext, id: &str, path: &str) -> Result<()> {
    let client = ctx.client().await?;
    let data = client.files().read(id, path).await?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

async fn write(
    ctx: &CliContext,
    id: &str,
    path: &str,
    from: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let data = match from {
        Some(local) => std::fs::read(local)
            .with_context(|| format!("failed to read {}", local.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    let size = data.len() as u64;

    let client = ctx.client().await?;
    client.files().write(id, path, data).await?;

    if format.is_json() {
        return print_json(&serde_json::json!({ "path": path, "bytes": size }));
    }
    println!("Wrote {} to {path}", format_bytes(size));
    Ok(())
}

async fn remove(ctx: &CliContext, id: &str, path: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    client.files().remove(id, path).await?;

    if format.is_json() {
        return print_json(&serde_json::json!({ "path": path, "removed": true }));
    }
    println!("Removed {path}");
    Ok(())
}

async fn make_dir(ctx: &CliContext, id: &str, path: &str, format: OutputFormat) -> Result<()> {
    let client = ctx.client().await?;
    client.files().make_dir(id, path).await?;

    if format.is_json() {
        return print_json(&serde_json::json!({ "path": path, "created": true }));
    }
    println!("Created {path}");
    Ok(())
}
