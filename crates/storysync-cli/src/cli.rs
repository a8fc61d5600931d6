use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "storysync")]
#[command(about = "Offline-first sync for geotagged stories")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue a new story locally for the next sync
    #[command(alias = "new")]
    Add(StoryArgs),
    /// Publish a story now, queueing it locally if that fails
    Submit(StoryArgs),
    /// List visible stories from the local store
    List {
        /// Only show stories waiting to be pushed
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push pending stories, pull the remote list and merge
    Sync {
        /// Output the sync report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a story locally and on the story service
    Delete {
        /// Story ID
        id: String,
    },
    /// Sync, then drop tombstones the story service no longer lists
    Purge,
    /// Manage the edge cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Deliver a push payload as a notification
    Push {
        /// JSON payload, e.g. '{"title": "Hi", "body": "New story"}'
        payload: Option<String>,
        /// Also simulate clicking the notification
        #[arg(long)]
        click: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct StoryArgs {
    /// Story description
    pub description: Vec<String>,
    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,
    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,
    /// Image file (or base64 `data:` URL) to attach
    #[arg(long, value_name = "PATH")]
    pub photo: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Pre-cache the asset manifest and activate
    Install,
    /// Remove cache namespaces that are not current
    Activate,
    /// Show the state of every cache namespace
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a URL through the edge cache
    Fetch {
        /// Absolute request URL
        url: String,
        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
