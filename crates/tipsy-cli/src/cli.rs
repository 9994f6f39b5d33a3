use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tipsy")]
#[command(about = "Keep a diary of the drinks you try")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the diary database and images
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a new drink
    #[command(alias = "new")]
    Add(AddArgs),
    /// Change an existing entry
    Edit(EditArgs),
    /// Show one entry in full
    Show {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// List entries grouped by day
    List {
        /// Number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Only entries carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry and its local image
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Manage tags
    #[command(subcommand)]
    Tags(TagCommands),
    /// Show diary statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Link the diary to a cloud account
    Login(LoginArgs),
    /// Forget the cached account
    Logout,
    /// Show the cached account
    Whoami,
    /// Change the account nickname
    Nickname {
        name: String,
    },
    /// Upload a new account avatar
    Avatar {
        /// Image file
        path: PathBuf,
    },
    /// Upload every local entry to the cloud
    Backup,
    /// Replace the local diary with the cloud copy
    Restore {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Delete every cloud record and image of this account
    CloudDelete {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show when the last backup finished
    LastBackup,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// What you drank
    pub name: String,
    /// Rating from 1 to 5
    #[arg(short, long)]
    pub rating: u8,
    /// Photo file, or an http(s) URL
    #[arg(short, long, value_name = "PATH")]
    pub image: String,
    /// Where it was
    #[arg(long)]
    pub location: Option<String>,
    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
    /// What it cost
    #[arg(long)]
    pub price: Option<f64>,
    /// Tag to attach; repeat for more
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Entry ID or unique ID prefix
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(short, long)]
    pub rating: Option<u8>,
    /// Replacement photo file, or an http(s) URL
    #[arg(short, long, value_name = "PATH")]
    pub image: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub price: Option<f64>,
    /// Add the tag if missing, remove it if present; repeatable
    #[arg(short, long = "toggle-tag")]
    pub toggle_tags: Vec<String>,
}

#[derive(Subcommand)]
pub enum TagCommands {
    /// List preset and custom tags
    List,
    /// Register a custom tag
    Add { tag: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct LoginArgs {
    /// Nickname to share; prompted for when omitted
    #[arg(long)]
    pub nickname: Option<String>,
    /// External avatar URL to share
    #[arg(long)]
    pub avatar_url: Option<String>,
    /// One-time code from the identity provider
    #[arg(long)]
    pub code: Option<String>,
}
