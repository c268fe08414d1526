use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "cloudbox")]
#[command(version, about = "Cloudbox - remote sandboxes from your terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration profile to use (defaults to the active profile)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// API key; takes precedence over stored credentials
    #[arg(long, global = true, env = "CLOUDBOX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API base URL override
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (defaults to the profile's `output` setting)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in through the browser
    Login(LoginArgs),

    /// Log out, removing the stored login token
    Logout,

    /// Show the account behind the current credentials
    Whoami,

    /// Credential management
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Profile management
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Sandbox lifecycle
    Sandbox {
        #[command(subcommand)]
        command: SandboxCommands,
    },

    /// Sandbox filesystem
    Files {
        #[command(subcommand)]
        command: FilesCommands,
    },

    /// Run a command inside a sandbox
    Exec(ExecArgs),

    /// Processes running inside a sandbox
    Process {
        #[command(subcommand)]
        command: ProcessCommands,
    },

    /// Sandbox environment variables
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Usage and billing
    Billing {
        #[command(subcommand)]
        command: BillingCommands,
    },

    /// Sandbox templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Identity provider: GoogleOAuth, GitHubOAuth or MicrosoftOAuth
    #[arg(long, default_value = "GoogleOAuth")]
    pub provider: String,

    /// Print the login URL and paste the redirect back instead of running a local listener
    #[arg(long)]
    pub no_browser: bool,

    /// Seconds to wait for the browser redirect
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Local callback port
    #[arg(long, hide = true)]
    pub port: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Show how this profile is authenticated
    Status,

    /// Store an API key for the profile
    SetKey {
        /// Key value; prompted for when omitted
        key: Option<String>,
    },

    /// Remove the stored API key, keeping any login token
    ClearKey,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    List,

    /// Get a value from the profile
    Get { key: String },

    /// Set a value on the profile
    Set { key: String, value: String },

    /// Remove a value from the profile
    Unset { key: String },

    /// Print the config file path
    Path,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List profiles
    List,

    /// Create an empty profile
    Create { name: String },

    /// Make a profile the active one
    Use { name: String },

    /// Delete a profile and its stored credentials
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum SandboxCommands {
    /// Create a sandbox
    Create {
        /// Template to start from (defaults to the profile's default_template)
        #[arg(short, long)]
        template: Option<String>,

        /// Lifetime in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Metadata entry as KEY=VALUE (repeatable)
        #[arg(long = "metadata", short = 'm')]
        metadata: Vec<String>,

        /// Environment variable as KEY=VALUE (repeatable)
        #[arg(long = "env", short = 'e')]
        env: Vec<String>,
    },

    /// List sandboxes
    List {
        /// Filter by state: running, paused or stopped
        #[arg(long)]
        state: Option<String>,
    },

    /// Show sandbox details
    Info { id: String },

    /// Pause a running sandbox
    Pause { id: String },

    /// Resume a paused sandbox
    Resume { id: String },

    /// Terminate a sandbox
    Kill { id: String },

    /// Show health checks
    Health { id: String },

    /// Show recent resource usage
    Metrics { id: String },
}

#[derive(Subcommand, Debug)]
pub enum FilesCommands {
    /// List a directory
    Ls {
        id: String,
        #[arg(default_value = "/")]
        path: String,
    },

    /// Print a file
    Cat { id: String, path: String },

    /// Write a file from a local file or stdin
    Write {
        id: String,
        path: String,

        /// Local file to upload; stdin is read when omitted
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Remove a file or directory
    Rm { id: String, path: String },

    /// Create a directory
    Mkdir { id: String, path: String },
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Sandbox ID
    pub id: String,

    /// Stream output as it is produced
    #[arg(long)]
    pub stream: bool,

    /// Working directory inside the sandbox
    #[arg(long)]
    pub cwd: Option<String>,

    /// Environment variable as KEY=VALUE (repeatable)
    #[arg(long = "env", short = 'e')]
    pub env: Vec<String>,

    /// Seconds before the command is killed
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Command to run
    #[arg(last = true, required = true)]
    pub cmd: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ProcessCommands {
    /// List processes
    List { id: String },

    /// Kill a process
    Kill { id: String, pid: u32 },
}

#[derive(Subcommand, Debug)]
pub enum EnvCommands {
    /// List variables
    List { id: String },

    /// Set one or more KEY=VALUE pairs
    Set {
        id: String,
        #[arg(required = true)]
        vars: Vec<String>,
    },

    /// Remove a variable
    Unset { id: String, name: String },
}

#[derive(Subcommand, Debug)]
pub enum BillingCommands {
    /// Show usage for a period (YYYY-MM-DD)
    Usage {
        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List templates
    List,

    /// Build a template from a local directory
    Build {
        /// Build context directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Template name
        #[arg(long)]
        name: String,

        /// Rebuild an existing template instead of creating one
        #[arg(long)]
        template_id: Option<String>,

        /// Dockerfile path relative to the context
        #[arg(long)]
        dockerfile: Option<String>,

        /// Command run when a sandbox starts
        #[arg(long)]
        start_cmd: Option<String>,

        #[arg(long)]
        cpu: Option<u32>,

        #[arg(long)]
        memory_mb: Option<u64>,
    },

    /// Delete a template
    Delete { id: String },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, OutputFormat};
    use clap::Parser;

    #[test]
    fn parses_login_defaults() {
        let cli = Cli::try_parse_from(["cloudbox", "login"]).expect("parse login");
        let Commands::Login(args) = cli.command else {
            panic!("expected login");
        };
        assert_eq!(args.provider, "GoogleOAuth");
        assert!(!args.no_browser);
        assert!(args.timeout.is_none());
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cloudbox", "sandbox", "list", "--profile", "staging", "--format", "json",
        ])
        .expect("parse sandbox list");
        assert_eq!(cli.profile.as_deref(), Some("staging"));
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Sandbox {
                command: super::SandboxCommands::List { state: None }
            }
        ));
    }

    #[test]
    fn parses_exec_trailing_command() {
        let cli = Cli::try_parse_from([
            "cloudbox", "exec", "sb-1", "--stream", "--env", "A=1", "--", "ls", "-la", "/tmp",
        ])
        .expect("parse exec");
        let Commands::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(args.id, "sb-1");
        assert!(args.stream);
        assert_eq!(args.env, vec!["A=1"]);
        assert_eq!(args.cmd, vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn exec_requires_a_command() {
        assert!(Cli::try_parse_from(["cloudbox", "exec", "sb-1"]).is_err());
    }

    #[test]
    fn parses_billing_dates() {
        let cli = Cli::try_parse_from(["cloudbox", "billing", "usage", "--start", "2026-01-01"])
            .expect("parse billing usage");
        let Commands::Billing {
            command: super::BillingCommands::Usage { start, end },
        } = cli.command
        else {
            panic!("expected billing usage");
        };
        assert_eq!(start.map(|d| d.to_string()).as_deref(), Some("2026-01-01"));
        assert!(end.is_none());

        assert!(
            Cli::try_parse_from(["cloudbox", "billing", "usage", "--start", "January"]).is_err()
        );
    }

    #[test]
    fn parses_auth_set_key_without_value() {
        let cli = Cli::try_parse_from(["cloudbox", "auth", "set-key"]).expect("parse set-key");
        assert!(matches!(
            cli.command,
            Commands::Auth {
                command: super::AuthCommands::SetKey { key: None }
            }
        ));
    }
}
