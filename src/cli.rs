use clap::Parser;

use crate::client::DEFAULT_BASE_URL;
use crate::cmd::Commands;

/// Terminal dashboard over a remote work-item service.
/// The service address defaults to a local deployment and can be overridden
/// via --base-url or the WORKBOARD_URL environment variable.
#[derive(Parser)]
#[command(name = "wb", version, about = "Work-item triage and AI-assisted assignment dashboard")]
pub struct Cli {
    /// Base URL of the remote task service.
    #[arg(long, global = true, env = "WORKBOARD_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[command(subcommand)]
    pub command: Commands,
}
