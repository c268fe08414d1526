pub mod json;
pub mod plain;
pub mod table;

use clap::ValueEnum;
use cloudbox_core::OutputPreference;

/// Output format for CLI commands
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Plain,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }

    pub fn is_plain(self) -> bool {
        matches!(self, OutputFormat::Plain)
    }
}

impl From<OutputPreference> for OutputFormat {
    fn from(pref: OutputPreference) -> Self {
        match pref {
            OutputPreference::Table => OutputFormat::Table,
            OutputPreference::Json => OutputFormat::Json,
            OutputPreference::Plain => OutputFormat::Plain,
        }
    }
}
