use std::path::PathBuf;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};
use tipsy_core::cloud::{Authorization, CloudServices, MemoryCloud, StaticAuthorizer};
use tipsy_core::config::AppPaths;
use tipsy_core::{DiaryEntry, EntryId};

use crate::cli::{AddArgs, EditArgs, LoginArgs, TagCommands};
use crate::commands::account::{login_authorizer, run_login, run_logout, run_nickname};
use crate::commands::backup::{run_backup, run_cloud_delete, run_restore};
use crate::commands::common::{render_rating, resolve_data_dir, resolve_entry, Session};
use crate::commands::entries::{run_add, run_delete, run_edit, run_list, run_stats};
use crate::commands::tags::run_tags;
use crate::error::CliError;

fn session() -> (TempDir, Session) {
    let tmp = tempdir().unwrap();
    let paths = AppPaths::new(tmp.path().join("data")).with_scratch_dir(tmp.path().join("scratch"));
    let session = Session::open_with(paths).unwrap();
    (tmp, session)
}

fn add_args(name: &str) -> AddArgs {
    AddArgs {
        name: name.to_string(),
        rating: 4,
        image: "https://cdn.example.com/drink.jpg".to_string(),
        location: Some("Bar Termini".to_string()),
        notes: None,
        price: Some(12.0),
        tags: vec!["Bitter".to_string(), " Amaro ".to_string()],
    }
}

fn edit_args(id: &str) -> EditArgs {
    EditArgs {
        id: id.to_string(),
        name: None,
        rating: None,
        image: None,
        location: None,
        notes: None,
        price: None,
        toggle_tags: Vec::new(),
    }
}

fn seed(session: &Session, id: &str, name: &str) -> DiaryEntry {
    let entry = DiaryEntry {
        id: EntryId::from(id),
        ..DiaryEntry::new(name, 3)
    };
    session.store.save(entry).unwrap()
}

fn memory_cloud(nickname: &str) -> (MemoryCloud, CloudServices) {
    let cloud = MemoryCloud::new("o-1");
    let authorizer = StaticAuthorizer::granted(Authorization {
        nickname: nickname.to_string(),
        avatar_url: String::new(),
        code: Some("code-1".to_string()),
    });
    let services = cloud.services(Arc::new(authorizer));
    (cloud, services)
}

#[test]
fn resolve_data_dir_prefers_flag_then_env_then_platform() {
    let platform = Some(PathBuf::from("/home/ada/.local/share"));
    assert_eq!(
        resolve_data_dir(
            Some(PathBuf::from("/tmp/flag")),
            Some("/tmp/env".to_string()),
            platform.clone()
        ),
        PathBuf::from("/tmp/flag")
    );
    assert_eq!(
        resolve_data_dir(None, Some(" /tmp/env ".to_string()), platform.clone()),
        PathBuf::from("/tmp/env")
    );
    assert_eq!(
        resolve_data_dir(None, Some("  ".to_string()), platform),
        PathBuf::from("/home/ada/.local/share/tipsy")
    );
    assert_eq!(resolve_data_dir(None, None, None), PathBuf::from(".tipsy"));
}

#[test]
fn render_rating_fills_stars() {
    assert_eq!(render_rating(3), "★★★☆☆");
    assert_eq!(render_rating(0), "☆☆☆☆☆");
    assert_eq!(render_rating(9), "★★★★★");
}

#[test]
fn resolve_entry_supports_exact_and_prefix_id() {
    let (_tmp, session) = session();
    seed(&session, "0192aaaa-1111", "Negroni");
    seed(&session, "0192aaaa-2222", "Boulevardier");
    seed(&session, "0193bbbb-3333", "Paloma");

    assert_eq!(
        resolve_entry(&session.store, "0192aaaa-1111").unwrap().name,
        "Negroni"
    );
    assert_eq!(resolve_entry(&session.store, " 0193 ").unwrap().name, "Paloma");
    assert!(matches!(
        resolve_entry(&session.store, "0192"),
        Err(CliError::AmbiguousEntryId(_))
    ));
    assert!(matches!(
        resolve_entry(&session.store, "ffff"),
        Err(CliError::EntryNotFound(_))
    ));
    assert!(matches!(
        resolve_entry(&session.store, "  "),
        Err(CliError::EmptyEntryId)
    ));
}

#[test]
fn add_saves_entry_and_registers_custom_tags() {
    let (_tmp, session) = session();
    run_add(&session, add_args("Negroni")).unwrap();

    let entries = session.store.list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Negroni");
    assert_eq!(entries[0].tags, vec!["Bitter", "Amaro"]);
    assert_eq!(
        entries[0].image_path.as_deref(),
        Some("https://cdn.example.com/drink.jpg")
    );
    assert_eq!(session.store.list_tags(), vec!["Amaro"]);
}

#[test]
fn add_rejects_invalid_draft_before_touching_the_image() {
    let (tmp, session) = session();
    let mut args = add_args("Negroni");
    args.rating = 0;
    args.image = tmp.path().join("missing.jpg").to_string_lossy().into_owned();

    assert!(matches!(
        run_add(&session, args),
        Err(CliError::Core(tipsy_core::Error::Validation(_)))
    ));
    assert!(session.store.list().is_empty());
}

#[test]
fn add_with_unreadable_image_saves_nothing() {
    let (tmp, session) = session();
    let picked = tmp.path().join("broken.jpg");
    std::fs::write(&picked, b"not an image").unwrap();
    let mut args = add_args("Negroni");
    args.image = picked.to_string_lossy().into_owned();

    assert!(matches!(
        run_add(&session, args),
        Err(CliError::Core(tipsy_core::Error::Compression(_)))
    ));
    assert!(session.store.list().is_empty());
    assert!(!session.paths.images_dir().exists());
}

#[test]
fn edit_updates_fields_and_toggles_tags() {
    let (_tmp, session) = session();
    run_add(&session, add_args("Negroni")).unwrap();
    let created = session.store.list().remove(0);

    let mut args = edit_args(&created.id.as_str()[..8]);
    args.rating = Some(5);
    args.location = Some(String::new());
    args.toggle_tags = vec!["Bitter".to_string(), "Smoky".to_string()];
    run_edit(&session, args).unwrap();

    let edited = session.store.get_by_id(created.id.as_str()).unwrap();
    assert_eq!(edited.rating, 5);
    assert_eq!(edited.location, None);
    assert_eq!(edited.tags, vec!["Amaro", "Smoky"]);
    assert_eq!(edited.create_time, created.create_time);
    assert_eq!(session.store.list_tags(), vec!["Amaro"]);
}

#[test]
fn delete_removes_entry() {
    let (_tmp, session) = session();
    seed(&session, "0192aaaa-1111", "Negroni");
    run_delete(&session, "0192aaaa").unwrap();
    assert!(session.store.list().is_empty());
    assert!(matches!(
        run_delete(&session, "0192aaaa"),
        Err(CliError::EntryNotFound(_))
    ));
}

#[test]
fn list_and_stats_run_on_empty_and_filled_diary() {
    let (_tmp, session) = session();
    run_list(&session, None, None, false).unwrap();
    run_stats(&session, true).unwrap();

    run_add(&session, add_args("Negroni")).unwrap();
    run_add(&session, add_args("Americano")).unwrap();
    run_list(&session, Some(1), Some("Bitter"), true).unwrap();
    run_list(&session, None, None, false).unwrap();
    run_stats(&session, false).unwrap();
}

#[test]
fn tags_add_trims_and_rejects_empty() {
    let (_tmp, session) = session();
    run_tags(
        &session,
        TagCommands::Add {
            tag: " Peaty ".to_string(),
        },
    )
    .unwrap();
    assert!(run_tags(
        &session,
        TagCommands::Add {
            tag: "   ".to_string()
        }
    )
    .is_err());
    run_tags(&session, TagCommands::List).unwrap();
    assert_eq!(session.store.list_tags(), vec!["Peaty"]);
}

#[test]
fn login_authorizer_uses_flags() {
    let authorizer = login_authorizer(LoginArgs {
        nickname: Some(" Ada ".to_string()),
        avatar_url: Some("https://cdn.example.com/ada.png".to_string()),
        code: None,
    })
    .unwrap();
    let expected = StaticAuthorizer::granted(Authorization {
        nickname: "Ada".to_string(),
        avatar_url: "https://cdn.example.com/ada.png".to_string(),
        code: None,
    });
    assert_eq!(format!("{authorizer:?}"), format!("{expected:?}"));
}

#[tokio::test]
async fn login_caches_identity_and_logout_clears_it() {
    let (_tmp, session) = session();
    let (cloud, services) = memory_cloud("Ada");

    run_login(&session, services.clone()).await.unwrap();
    let identity = session.cache.load().unwrap();
    assert_eq!(identity.openid, "o-1");
    assert_eq!(identity.nickname, "Ada");
    assert!(cloud.user("o-1").is_some());

    run_nickname(&session, services, "Grace").await.unwrap();
    assert_eq!(session.cache.load().unwrap().nickname, "Grace");

    run_logout(&session).unwrap();
    assert!(session.cache.load().is_none());
}

#[tokio::test]
async fn declined_login_is_a_soft_cancellation() {
    let (_tmp, session) = session();
    let cloud = MemoryCloud::new("o-1");
    let services = cloud.services(Arc::new(StaticAuthorizer::declined()));

    let error = run_login(&session, services).await.unwrap_err();
    assert!(error.is_soft_cancellation());
    assert!(session.cache.load().is_none());
}

#[tokio::test]
async fn backup_then_restore_round_trips_the_diary() {
    let (_tmp, session) = session();
    let (cloud, services) = memory_cloud("Ada");
    run_login(&session, services.clone()).await.unwrap();
    run_add(&session, add_args("Negroni")).unwrap();
    run_add(&session, add_args("Americano")).unwrap();
    let before = session.store.list();

    run_backup(&session, services.clone()).await.unwrap();
    assert_eq!(cloud.entries().len(), 2);

    session.store.clear().unwrap();
    run_restore(&session, services, true).await.unwrap();
    let ids = |entries: Vec<DiaryEntry>| {
        let mut ids: Vec<EntryId> = entries.into_iter().map(|entry| entry.id).collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(session.store.list()), ids(before));
}

#[tokio::test]
async fn cloud_commands_require_login() {
    let (_tmp, session) = session();
    let (_cloud, services) = memory_cloud("Ada");

    assert!(matches!(
        run_backup(&session, services.clone()).await,
        Err(CliError::Core(tipsy_core::Error::NotAuthenticated))
    ));
    assert!(matches!(
        run_cloud_delete(&session, services, true).await,
        Err(CliError::Core(tipsy_core::Error::NotAuthenticated))
    ));
}

#[tokio::test]
async fn cloud_delete_wipes_remote_copy_only() {
    let (_tmp, session) = session();
    let (cloud, services) = memory_cloud("Ada");
    run_login(&session, services.clone()).await.unwrap();
    run_add(&session, add_args("Negroni")).unwrap();
    run_backup(&session, services.clone()).await.unwrap();

    run_cloud_delete(&session, services, true).await.unwrap();
    assert!(cloud.entries().is_empty());
    assert_eq!(session.store.list().len(), 1);
}
