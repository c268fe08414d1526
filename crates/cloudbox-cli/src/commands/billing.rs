use anyhow::{Result, bail};
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::BillingCommands;
use crate::output::{OutputFormat, json::print_json, plain::print_rows, table::print_table};
use crate::setup::CliContext;

pub async fn run(ctx: &CliContext, command: BillingCommands, format: OutputFormat) -> Result<()> {
    let BillingCommands::Usage { start, end } = command;
    if let (Some(start), Some(end)) = (start, end)
        && start > end
    {
        bail!("--start ({start}) must not be after --end ({end})");
    }

    let client = ctx.client().await?;
    let report = client.billing().usage(start, end).await?;

    if format.is_json() {
        return print_json(&report);
    }
    if format.is_plain() {
        return print_rows(report.items.iter().map(|item| {
            [
                item.description.clone(),
                item.sandbox_id.clone().unwrap_or_default(),
                format!("{}", item.quantity),
                item.unit.clone(),
                format!("{:.2}", item.cost),
            ]
        }));
    }

    println!(
        "Usage {} to {}",
        report.period_start.format("%Y-%m-%d"),
        report.period_end.format("%Y-%m-%d")
    );

    let mut table = Table::new();
    table.set_header(vec!["Item", "Sandbox", "Quantity", "Cost"]);
    for item in &report.items {
        table.add_row(vec![
            Cell::new(&item.description),
            Cell::new(item.sandbox_id.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.2} {}", item.quantity, item.unit))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", item.cost)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total"),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format!("{:.2} {}", report.total_cost, report.currency))
            .set_alignment(CellAlignment::Right),
    ]);
    print_table(table)
}
