use std::path::PathBuf;

use clap::Parser;

/// Generate a PDF of Jira issues for an Agile board.
///
/// Issues come either from a Jira REST API (probing credentials first) or
/// from a pre-exported XML dump. Anything missing from the config file and
/// the command line is prompted for interactively in REST mode.
#[derive(Debug, Parser)]
#[command(name = "storycards", disable_version_flag = true)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Jira XML export file (skips the REST API entirely)
    #[arg(short = 'x', long)]
    pub xml: Option<PathBuf>,

    /// Jira server URL
    #[arg(short, long)]
    pub server: Option<String>,

    /// User to authenticate as
    #[arg(short, long)]
    pub user: Option<String>,

    /// Password for the user
    #[arg(short, long)]
    pub passwd: Option<String>,

    /// Jira project key (e.g. IBU)
    #[arg(long)]
    pub project: Option<String>,

    /// Fix version to select issues by (e.g. Sprint 91); extra tokens are
    /// joined with spaces and surrounding double quotes are stripped
    #[arg(long, num_args = 1..)]
    pub version: Option<Vec<String>>,

    /// Output PDF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// HTTP timeout in seconds for REST requests
    #[arg(long)]
    pub timeout: Option<u64>,
}
