use tipsy_core::cloud::CloudServices;
use tipsy_core::sync::SyncService;

use crate::commands::common::{confirm, format_timestamp, Session};
use crate::error::CliError;

fn sync_service(session: &Session, cloud: CloudServices) -> SyncService {
    SyncService::new(session.cache.context(), cloud)
}

pub async fn run_backup(session: &Session, cloud: CloudServices) -> Result<(), CliError> {
    let entries = session.store.list();
    let report = sync_service(session, cloud).backup(&entries).await?;
    if report.count == report.total {
        println!("Backed up {} entries", report.count);
    } else {
        println!(
            "Backed up {} of {} entries; see the log for failures",
            report.count, report.total
        );
    }
    Ok(())
}

pub async fn run_restore(
    session: &Session,
    cloud: CloudServices,
    assume_yes: bool,
) -> Result<(), CliError> {
    let local_count = session.store.list().len();
    if !assume_yes
        && local_count > 0
        && !confirm(&format!(
            "Replace {local_count} local entries with the cloud copy?"
        ))?
    {
        println!("Restore cancelled");
        return Ok(());
    }

    let entries = sync_service(session, cloud).restore().await?;
    let installed = session.store.replace_all(entries)?;
    println!("Restored {installed} entries");
    Ok(())
}

pub async fn run_cloud_delete(
    session: &Session,
    cloud: CloudServices,
    assume_yes: bool,
) -> Result<(), CliError> {
    if !assume_yes && !confirm("Delete every cloud record and image of this account?")? {
        println!("Cloud delete cancelled");
        return Ok(());
    }

    let report = sync_service(session, cloud).delete_all_remote().await?;
    println!("Deleted {} cloud entries", report.deleted_count);
    Ok(())
}

pub async fn run_last_backup(session: &Session, cloud: CloudServices) -> Result<(), CliError> {
    if session.cache.load().is_none() {
        println!("Not logged in");
        return Ok(());
    }
    match sync_service(session, cloud).last_backup_time().await {
        Some(at) => println!("{}", format_timestamp(at)),
        None => println!("Never backed up"),
    }
    Ok(())
}
