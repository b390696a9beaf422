//! Client core against a live server on a loopback socket.

mod common;

use cipherkeep_core::crypto::KdfParams;
use cipherkeep_core::{ClientConfig, InitOutcome, Keeper, KeeperError};
use cipherkeep_server::{build_router, AppState, SecretStore};
use common::test_config;
use std::path::Path;
use tempfile::TempDir;

struct LiveServer {
    url: String,
    _temp_dir: TempDir,
}

async fn spawn_server() -> LiveServer {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.storage_path = temp_dir.path().join("server.db");

    let store = SecretStore::open(&config.storage_path).unwrap();
    let router = build_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    LiveServer {
        url: format!("http://{}", addr),
        _temp_dir: temp_dir,
    }
}

fn keeper(server: &LiveServer, data_dir: &Path) -> Keeper {
    Keeper::new(ClientConfig {
        server_url: server.url.clone(),
        data_dir: data_dir.to_path_buf(),
        page_size: 2,
        kdf: KdfParams::interactive_test(),
        ..ClientConfig::default()
    })
    .unwrap()
}

/// The test server echoes the challenge, so the prompt answers with it.
fn echo_code(message: &str) -> cipherkeep_core::Result<String> {
    Ok(message.to_string())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_device_lifecycle() {
    let server = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let keeper = keeper(&server, dir.path());

    let outcome = keeper
        .initialize("alice@example.com", "correct horse", echo_code)
        .await
        .unwrap();
    assert_eq!(outcome, InitOutcome::Created);

    let mut session = keeper.unlock("correct horse").unwrap();
    assert_eq!(session.account(), "alice@example.com");
    assert!(session.list().await.unwrap().is_empty());

    let first = session.add(b"hunter2", r#"{"site":"mail"}"#).await.unwrap();
    let second = session.add(b"swordfish", r#"{"site":"bank"}"#).await.unwrap();
    let third = session.add(b"", "{}").await.unwrap();

    let entries = session.list().await.unwrap();
    let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![first, second, third]);
    assert_eq!(session.show(first).await.unwrap(), b"hunter2");
    assert_eq!(session.show(third).await.unwrap(), b"");

    session.update(first, b"hunter3", None).await.unwrap();
    assert_eq!(session.show(first).await.unwrap(), b"hunter3");
    let entry = session
        .list()
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.id == first)
        .unwrap();
    assert_eq!(entry.metadata, r#"{"site":"mail"}"#);

    session.delete(second).await.unwrap();
    assert!(matches!(session.show(second).await, Err(KeeperError::NotFound(_))));
    assert!(matches!(
        session.delete(second).await,
        Err(KeeperError::NotFound(_))
    ));

    let report = session.sync().await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(session.list().await.unwrap().len(), 2);

    // A fresh unlock reads the persisted mirror and token.
    drop(session);
    let mut session = keeper.unlock("correct horse").unwrap();
    assert_eq!(session.show(first).await.unwrap(), b"hunter3");
    assert!(matches!(
        keeper.unlock("wrong horse"),
        Err(KeeperError::WrongPassword)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_device_joins_and_converges() {
    let server = spawn_server().await;
    let laptop_dir = tempfile::tempdir().unwrap();
    let phone_dir = tempfile::tempdir().unwrap();
    let laptop = keeper(&server, laptop_dir.path());
    let phone = keeper(&server, phone_dir.path());

    laptop
        .initialize("alice", "correct horse", echo_code)
        .await
        .unwrap();
    let mut on_laptop = laptop.unlock("correct horse").unwrap();
    let kept = on_laptop.add(b"kept", "{}").await.unwrap();
    let dropped = on_laptop.add(b"dropped", "{}").await.unwrap();
    on_laptop.delete(dropped).await.unwrap();

    let outcome = phone
        .initialize("alice", "correct horse", echo_code)
        .await
        .unwrap();
    match outcome {
        InitOutcome::Joined(report) => {
            assert_eq!(report.applied, 3);
            assert!(report.batches >= 2);
        }
        other => panic!("expected join, got {:?}", other),
    }

    let mut on_phone = phone.unlock("correct horse").unwrap();
    let ids: Vec<i64> = on_phone.list().await.unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![kept]);
    assert_eq!(on_phone.show(kept).await.unwrap(), b"kept");

    on_phone.update(kept, b"edited on phone", None).await.unwrap();
    let added = on_phone.add(b"from phone", "{}").await.unwrap();

    let report = on_laptop.sync().await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(on_laptop.show(kept).await.unwrap(), b"edited on phone");
    assert_eq!(on_laptop.show(added).await.unwrap(), b"from phone");
    assert_eq!(
        on_laptop.mirror().current_cursor().unwrap(),
        on_phone.mirror().current_cursor().unwrap()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_join_with_wrong_password_fails() {
    let server = spawn_server().await;
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();

    keeper(&server, first_dir.path())
        .initialize("alice", "correct horse", echo_code)
        .await
        .unwrap();

    let intruder = keeper(&server, second_dir.path());
    let result = intruder
        .initialize("alice", "battery staple", echo_code)
        .await;
    assert!(matches!(result, Err(KeeperError::WrongPassword)));
    assert!(intruder.unlock("battery staple").is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wrong_code_aborts_initialize() {
    let server = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let keeper = keeper(&server, dir.path());

    let result = keeper
        .initialize("alice", "correct horse", |_| Ok("0".repeat(32)))
        .await;
    assert!(matches!(result, Err(KeeperError::Unauthorized(_))));
    assert!(matches!(
        keeper.unlock("correct horse"),
        Err(KeeperError::NotInitialized)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_show_pulls_records_from_other_devices() {
    let server = spawn_server().await;
    let laptop_dir = tempfile::tempdir().unwrap();
    let phone_dir = tempfile::tempdir().unwrap();
    let laptop = keeper(&server, laptop_dir.path());
    let phone = keeper(&server, phone_dir.path());

    laptop
        .initialize("alice", "correct horse", echo_code)
        .await
        .unwrap();
    phone
        .initialize("alice", "correct horse", echo_code)
        .await
        .unwrap();

    let mut on_laptop = laptop.unlock("correct horse").unwrap();
    let id = on_laptop.add(b"new", "{}").await.unwrap();

    let mut on_phone = phone.unlock("correct horse").unwrap();
    assert_eq!(on_phone.show(id).await.unwrap(), b"new");

    on_laptop.update(id, b"newer", None).await.unwrap();
    assert_eq!(on_phone.show(id).await.unwrap(), b"newer");

    on_laptop.delete(id).await.unwrap();
    assert!(matches!(
        on_phone.show(id).await,
        Err(KeeperError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initialize_trims_account() {
    let server = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let keeper = keeper(&server, dir.path());

    keeper
        .initialize("  alice  ", "correct horse", echo_code)
        .await
        .unwrap();

    let session = keeper.unlock("correct horse").unwrap();
    assert_eq!(session.account(), "alice");
    assert!(keeper.profile().has_mirror("alice").unwrap());
    assert_eq!(keeper.profile().current().unwrap(), "alice");
}
