//! CLI parser
use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use crate::constants::DEFAULT_WEBHOOK_URL;
use crate::dream::FIELDS;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "DREAMWORLD_DEBUG")]
    /// Enable debug logging. Env: DREAMWORLD_DEBUG
    pub debug: bool,

    #[clap(long, short, default_value = DEFAULT_WEBHOOK_URL, env = "DREAMWORLD_ENDPOINT")]
    /// Webhook the dream is posted to.
    /// Env: DREAMWORLD_ENDPOINT
    pub endpoint: Url,

    #[clap(long, default_value = "90", env = "DREAMWORLD_TIMEOUT_SECS")]
    /// Request timeout in seconds, defaults to `90`.
    /// Env: DREAMWORLD_TIMEOUT_SECS
    pub timeout_secs: u64,

    #[clap(long, env = "DREAMWORLD_NO_DEMO_FALLBACK")]
    /// Fail instead of showing a demo image when the webhook is unreachable.
    /// Env: DREAMWORLD_NO_DEMO_FALLBACK
    pub no_demo_fallback: bool,

    #[clap(subcommand)]
    /// What to do
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Describe a dream and generate its image
    Generate(GenerateArgs),
    /// Send a test dream to check the webhook answers
    Check,
}

/// The dream form, one flag per field.
#[derive(clap::Args, Debug, Default)]
pub struct GenerateArgs {
    /// Your name
    #[arg(long)]
    pub name: Option<String>,
    /// Colors of the dream
    #[arg(long)]
    pub colors: Option<String>,
    /// Places in the dream
    #[arg(long)]
    pub locations: Option<String>,
    /// Mood of the dream
    #[arg(long)]
    pub atmosphere: Option<String>,
    /// Who shows up
    #[arg(long)]
    pub characters: Option<String>,
    /// Anything else
    #[arg(long)]
    pub details: Option<String>,

    /// Save the image once it is displayed
    #[arg(long)]
    pub download: bool,
    /// Share the image once it is displayed
    #[arg(long)]
    pub share: bool,
    /// Where downloads are written
    #[arg(long, default_value = ".", env = "DREAMWORLD_OUT_DIR")]
    pub out_dir: PathBuf,
}

impl GenerateArgs {
    /// The form as a field mapping; fields that weren't given are left out.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let values = [
            &self.name,
            &self.colors,
            &self.locations,
            &self.atmosphere,
            &self.characters,
            &self.details,
        ];
        FIELDS
            .iter()
            .zip(values)
            .filter_map(|(field, value)| {
                value
                    .as_ref()
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect()
    }
}
