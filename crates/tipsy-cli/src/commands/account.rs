use std::fs;
use std::path::Path;

use tipsy_core::cleanup::best_effort;
use tipsy_core::cloud::{Authorization, CloudServices, StaticAuthorizer};
use tipsy_core::identity::IdentityService;
use tipsy_core::storage::DEFAULT_QUALITY;
use tipsy_core::util::normalize_text_option;

use crate::cli::LoginArgs;
use crate::commands::common::{prompt_line, Session};
use crate::error::CliError;

/// Turn the login flags (or a terminal prompt) into the profile the user
/// agrees to share. No nickname means the user declined.
pub fn login_authorizer(args: LoginArgs) -> Result<StaticAuthorizer, CliError> {
    let nickname = match normalize_text_option(args.nickname) {
        Some(nickname) => Some(nickname),
        None => prompt_line("Nickname to share (empty to cancel): ")?,
    };

    Ok(nickname.map_or_else(StaticAuthorizer::declined, |nickname| {
        StaticAuthorizer::granted(Authorization {
            nickname,
            avatar_url: normalize_text_option(args.avatar_url).unwrap_or_default(),
            code: normalize_text_option(args.code),
        })
    }))
}

fn identity_service(session: &Session, cloud: CloudServices) -> IdentityService {
    IdentityService::new(session.cache.clone(), session.cache.context(), cloud)
}

pub async fn run_login(session: &Session, cloud: CloudServices) -> Result<(), CliError> {
    let identity = identity_service(session, cloud).login().await?;
    println!("Logged in as {} ({})", identity.nickname, identity.openid);
    Ok(())
}

pub fn run_logout(session: &Session) -> Result<(), CliError> {
    session.cache.clear()?;
    tracing::info!("Logged out");
    println!("Logged out");
    Ok(())
}

pub fn run_whoami(session: &Session) {
    match session.cache.load() {
        Some(identity) => {
            println!("openid    {}", identity.openid);
            println!("nickname  {}", identity.nickname);
            if !identity.avatar_url.is_empty() {
                println!("avatar    {}", identity.avatar_url);
            }
        }
        None => println!("Not logged in"),
    }
}

pub async fn run_nickname(
    session: &Session,
    cloud: CloudServices,
    name: &str,
) -> Result<(), CliError> {
    let identity = identity_service(session, cloud)
        .update_nickname(name)
        .await?;
    println!("{}", identity.nickname);
    Ok(())
}

pub async fn run_avatar(
    session: &Session,
    cloud: CloudServices,
    path: &Path,
) -> Result<(), CliError> {
    let compressed = session.store.assets().compress(path, DEFAULT_QUALITY)?;
    let result = identity_service(session, cloud)
        .update_avatar(&compressed)
        .await;
    best_effort("Removing compressed avatar", fs::remove_file(&compressed));

    println!("{}", result?);
    Ok(())
}
