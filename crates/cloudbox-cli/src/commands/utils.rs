use anyhow::{Result, bail};
use chrono::{DateTime, Local, TimeZone, Utc};
use cloudbox_core::api::{SandboxState, parse_assignment};
use std::collections::BTreeMap;

pub fn format_datetime(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "-".to_string(),
    }
}

/// Epoch seconds as local time.
pub fn format_epoch(timestamp: Option<i64>) -> String {
    let Some(ts) = timestamp else {
        return "-".to_string();
    };

    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Collect repeated `KEY=VALUE` arguments; later keys win.
pub fn parse_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for pair in pairs {
        let (key, value) = parse_assignment(pair)?;
        map.insert(key, value);
    }
    Ok(map)
}

pub fn parse_state(input: &str) -> Result<SandboxState> {
    let state = match input.trim().to_ascii_lowercase().as_str() {
        "running" => SandboxState::Running,
        "paused" => SandboxState::Paused,
        "stopped" => SandboxState::Stopped,
        _ => bail!("unknown sandbox state '{input}' (expected running, paused or stopped)"),
    };
    Ok(state)
}

pub fn preview_text(input: &str, max_len: usize) -> String {
    if input.chars().count() <= max_len {
        return input.to_string();
    }

    let mut preview = input.chars().take(max_len).collect::<String>();
    preview.push('…');
    preview
}
