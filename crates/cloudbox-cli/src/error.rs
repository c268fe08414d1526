use colored::Colorize;

fn suggest(lines: &[&str]) {
    eprintln!("\n{}", "Suggestion:".yellow().bold());
    for line in lines {
        eprintln!("  {line}");
    }
}

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("login failed") {
        suggest(&["Try again or use the web console to create an API key, then run:"]);
        eprintln!("  {} cloudbox auth set-key", "$".dimmed());
    }

    if msg.contains("invalid provider") {
        suggest(&["Valid providers are GoogleOAuth, GitHubOAuth and MicrosoftOAuth."]);
    }

    if msg.contains("already in use") {
        suggest(&["Another login may be running. Close it, or log in without a local listener:"]);
        eprintln!("  {} cloudbox login --no-browser", "$".dimmed());
    }

    if msg.contains("not authenticated") || msg.contains("unauthorized") {
        suggest(&["Log in with:"]);
        eprintln!("  {} cloudbox login", "$".dimmed());
    }

    if msg.contains("profile") && msg.contains("not found") {
        suggest(&["List available profiles with:"]);
        eprintln!("  {} cloudbox profile list", "$".dimmed());
    }

    if msg.contains("unknown config key") {
        suggest(&["Show the settable keys with:"]);
        eprintln!("  {} cloudbox config list", "$".dimmed());
    }

    if msg.contains("connection refused") || msg.contains("network") {
        suggest(&["Check your internet connection and the configured base_url, then try again."]);
    }

    std::process::exit(1);
}
