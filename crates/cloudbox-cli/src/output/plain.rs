use anyhow::Result;
use std::io::Write;

/// Render rows as tab-separated lines for scripting.
pub fn format_rows<R, C>(rows: R) -> String
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    let mut out = String::new();
    for row in rows {
        let cells: Vec<String> = row
            .into_iter()
            .map(|cell| cell.as_ref().replace(['\t', '\n'], " "))
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

pub fn print_rows<R, C>(rows: R) -> Result<()>
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(format_rows(rows).as_bytes())?;
    Ok(())
}
