use anyhow::Result;
use cloudbox_core::api::{RunCommand, StreamEvent};
use comfy_table::{Cell, Table};
use std::io::Write;
use tracing::debug;

use super::utils::{format_datetime, parse_pairs, preview_text};
use crate::cli::{ExecArgs, ProcessCommands};
use crate::output::{OutputFormat, json::print_json, plain::print_rows, table::print_table};
use crate::setup::CliContext;

/// Join argv into one shell command line, single-quoting words that need it.
fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            let safe = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
            if safe {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the remote exit code.
pub async fn run(ctx: &CliContext, args: ExecArgs, format: OutputFormat) -> Result<i32> {
    let command = RunCommand {
        cmd: shell_join(&args.cmd),
        cwd: args.cwd,
        env: parse_pairs(&args.env)?,
        timeout: args.timeout,
    };
    debug!(sandbox = %args.id, cmd = %command.cmd, stream = args.stream, "Executing command");

    let client = ctx.client().await?;

    if args.stream {
        let json = format.is_json();
        let exit_code = client
            .commands()
            .stream(&args.id, &command, |event| {
                if json {
                    if let Ok(line) = serde_json::to_string(event) {
                        println!("{line}");
                    }
                    return;
                }
                match event {
                    StreamEvent::Stdout { data } => {
                        let mut out = std::io::stdout().lock();
                        let _ = out.write_all(data.as_bytes());
                        let _ = out.flush();
                    }
                    StreamEvent::Stderr { data } => {
                        let mut err = std::io::stderr().lock();
                        let _ = err.write_all(data.as_bytes());
                        let _ = err.flush();
                    }
                    StreamEvent::Exit { .. } | StreamEvent::Error { .. } => {}
                }
            })
            .await?;
        return Ok(exit_code);
    }

    let result = client.commands().run(&args.id, &command).await?;
    if format.is_json() {
        print_json(&result)?;
    } else {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
        std::io::stdout().flush()?;
    }
    Ok(result.exit_code)
}

pub async fn run_process(
    ctx: &CliContext,
    command: ProcessCommands,
    format: OutputFormat,
) -> Result<()> {
    let client = ctx.client().await?;

    match command {
        ProcessCommands::List { id } => {
            let processes = client.commands().list_processes(&id).await?;

            if format.is_json() {
                return print_json(&processes);
            }
            if format.is_plain() {
                return print_rows(
                    processes
                        .iter()
                        .map(|p| [p.pid.to_string(), p.cmd.clone()]),
                );
            }

            let mut table = Table::new();
            table.set_header(vec!["PID", "Command", "CWD", "Started"]);
            for p in &processes {
                table.add_row(vec![
                    Cell::new(p.pid),
                    Cell::new(preview_text(&p.cmd, 60)),
                    Cell::new(p.cwd.as_deref().unwrap_or("-")),
                    Cell::new(format_datetime(p.started_at)),
                ]);
            }
            print_table(table)
        }
        ProcessCommands::Kill { id, pid } => {
            client.commands().kill_process(&id, pid).await?;

            if format.is_json() {
                return print_json(&serde_json::json!({ "pid": pid, "killed": true }));
            }
            println!("Killed process {pid} in sandbox {id}");
            Ok(())
        }
    }
}
