use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "staleguard")]
#[command(about = "Audits client backups on a cloud drive and reports stale ones")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Status database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan the drive and update every client's backup status
    Scan(ScanArgs),

    /// Show stored backup statuses
    Report(ReportArgs),

    /// Send the stale-client notification from the last scan's results
    Notify(NotifyArgs),

    /// Manage clients
    #[command(subcommand)]
    Client(ClientCommand),
}

#[derive(Args)]
pub struct ScanArgs {
    /// Local mount of the cloud drive (overrides config)
    #[arg(long)]
    pub drive_root: Option<PathBuf>,

    /// Output as JSON instead of table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ReportArgs {
    /// Only clients without a current backup
    #[arg(long, default_value_t = false)]
    pub outdated: bool,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct NotifyArgs {
    /// Print the message instead of queueing it
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum ClientCommand {
    /// List all clients, ignored ones included
    List,

    /// Show one client and its backup status
    Show { id: String },

    /// Register a client before its folder appears on the drive
    Add {
        id: String,
        #[command(flatten)]
        fields: ClientFields,
        /// Exclude from scans and reports
        #[arg(long, default_value_t = false)]
        ignore: bool,
    },

    /// Change a client's settings
    Update {
        id: String,
        #[command(flatten)]
        fields: ClientFields,
        /// Drop the per-client freshness window
        #[arg(long, default_value_t = false, conflicts_with = "window_days")]
        clear_window: bool,
    },

    /// Exclude a client from scans and reports
    Ignore { id: String },

    /// Include a previously ignored client again
    Unignore { id: String },

    /// Delete a client and its backup status
    Remove { id: String },
}

#[derive(Args)]
pub struct ClientFields {
    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Freshness window in days for this client
    #[arg(long)]
    pub window_days: Option<u32>,

    /// Contact emails
    #[arg(long, value_delimiter = ',')]
    pub emails: Option<Vec<String>>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
}
