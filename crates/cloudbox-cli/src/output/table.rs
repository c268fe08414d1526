use anyhow::Result;
use comfy_table::Table;

pub fn print_table(table: Table) -> Result<()> {
    println!("{table}");
    Ok(())
}

/// Two-column table for single-record views.
pub fn key_value_table<K, V>(rows: impl IntoIterator<Item = (K, V)>) -> Table
where
    K: ToString,
    V: ToString,
{
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    for (key, value) in rows {
        table.add_row(vec![key.to_string(), value.to_string()]);
    }
    table
}
