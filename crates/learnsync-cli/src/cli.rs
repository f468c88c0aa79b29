use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use learnsync_core::ConflictResolution;

#[derive(Parser)]
#[command(name = "learnsync")]
#[command(about = "Sync offline learning records with the learning platform")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync pass now
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show queued records per kind
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a record captured offline
    Enqueue {
        /// Record kind (quiz-attempt, progress, chat-message, achievement)
        kind: String,
        /// JSON file holding the record (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Inspect and resolve sync conflicts
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },
    /// Keep syncing in the background and print engine events
    Watch {
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConflictCommands {
    /// List stored conflicts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflict by id
    Resolve {
        /// Conflict id
        id: String,
        /// Which version wins
        #[arg(long = "use", value_enum)]
        resolution: ResolutionArg,
    },
    /// Remove resolved conflicts
    Clear,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolutionArg {
    Local,
    Server,
    Merge,
}

impl From<ResolutionArg> for ConflictResolution {
    fn from(value: ResolutionArg) -> Self {
        match value {
            ResolutionArg::Local => Self::Local,
            ResolutionArg::Server => Self::Server,
            ResolutionArg::Merge => Self::Merge,
        }
    }
}
