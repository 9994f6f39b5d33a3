//! Tipsy CLI - keep a drinking diary from the terminal
//!
//! Entries live in a local `SQLite` file; cloud backup is enabled by setting
//! the Supabase, login-function and R2 variables (a `.env` file works too).

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use clap::Parser;
use tipsy_core::cloud::{CloudServices, StaticAuthorizer};

use crate::cli::{Cli, Commands};
use crate::commands::account::{
    login_authorizer, run_avatar, run_login, run_logout, run_nickname, run_whoami,
};
use crate::commands::backup::{run_backup, run_cloud_delete, run_last_backup, run_restore};
use crate::commands::common::{cloud_from_env, default_data_dir, Session};
use crate::commands::entries::{run_add, run_delete, run_edit, run_list, run_show, run_stats};
use crate::commands::tags::run_tags;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        if error.is_soft_cancellation() {
            eprintln!("Cancelled");
            return;
        }
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tipsy=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = default_data_dir(cli.data_dir);
    let session = Session::open(&data_dir)?;
    tracing::debug!("Opened diary at {}", session.paths.db_path().display());

    match cli.command {
        Commands::Add(args) => run_add(&session, args)?,
        Commands::Edit(args) => run_edit(&session, args)?,
        Commands::Show { id } => run_show(&session, &id)?,
        Commands::List { limit, tag, json } => run_list(&session, limit, tag.as_deref(), json)?,
        Commands::Delete { id } => run_delete(&session, &id)?,
        Commands::Tags(command) => run_tags(&session, command)?,
        Commands::Stats { json } => run_stats(&session, json)?,
        Commands::Login(args) => {
            let authorizer = login_authorizer(args)?;
            run_login(&session, cloud_from_env(Arc::new(authorizer))?).await?;
        }
        Commands::Logout => run_logout(&session)?,
        Commands::Whoami => run_whoami(&session),
        Commands::Nickname { name } => run_nickname(&session, cloud()?, &name).await?,
        Commands::Avatar { path } => run_avatar(&session, cloud()?, &path).await?,
        Commands::Backup => run_backup(&session, cloud()?).await?,
        Commands::Restore { yes } => run_restore(&session, cloud()?, yes).await?,
        Commands::CloudDelete { yes } => run_cloud_delete(&session, cloud()?, yes).await?,
        Commands::LastBackup => run_last_backup(&session, cloud()?).await?,
    }

    Ok(())
}

/// Cloud services for commands that never prompt for authorization.
fn cloud() -> Result<CloudServices, CliError> {
    cloud_from_env(Arc::new(StaticAuthorizer::declined()))
}
