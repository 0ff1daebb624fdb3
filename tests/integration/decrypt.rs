//! Integration tests for password recovery and the password cache.

use pdfops::engine::scripted::ScriptedOp;
use pdfops::engine::ScriptedEngine;
use pdfops::output::MemorySink;
use pdfops::password::{PasswordManager, store};
use pdfops::{CancelToken, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{marker_file, scripted_service, service_with, test_config};

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_password_crack_and_cache() {
    let dir = TempDir::new().unwrap();
    let file = marker_file(dir.path(), "secret.pdf", 2);
    let engine = Arc::new(
        ScriptedEngine::new()
            .with_encrypted(&file)
            .with_password("correct"),
    );
    let service = scripted_service(&engine, dir.path()).await;
    let sink = MemorySink::new();

    let outcome = service
        .decrypt(
            &file,
            None,
            &words(&["wrong1", "wrong2", "correct", "wrong3"]),
            Some(&sink),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.password.as_deref(), Some("correct"));
    assert_eq!(outcome.attempts, 3);
    assert!(!outcome.is_original);
    assert_eq!(outcome.path, dir.path().join("tmp").join("decrypted_secret.pdf"));
    assert!(outcome.path.exists());
    assert_eq!(service.passwords().get(&file).as_deref(), Some("correct"));
    assert_eq!(
        sink.lines(),
        vec![
            "attempting wrong1 (1/4)",
            "attempting wrong2 (2/4)",
            "attempting correct (3/4)",
        ]
    );

    // The cached password is tried first on the next run.
    let again = service
        .decrypt(&file, None, &words(&["wrong1", "correct"]), None, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(again.attempts, 1);

    assert_eq!(service.cleanup().await, 1);
    assert!(!outcome.path.exists());
}

#[tokio::test]
async fn test_attempts_bounded_by_max_attempts() {
    let dir = TempDir::new().unwrap();
    let file = marker_file(dir.path(), "locked.pdf", 1);
    let engine = Arc::new(ScriptedEngine::new().with_encrypted(&file).with_password("never"));
    let mut config = test_config(dir.path());
    config.decrypt.max_attempts = 2;
    let service = service_with(engine.clone(), config).await;

    let err = service
        .decrypt(&file, None, &words(&["a", "b", "c", "d"]), None, &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Encrypted);
    assert_eq!(engine.decrypt_passwords(), words(&["a", "b"]));
}

#[tokio::test]
async fn test_empty_dictionary_is_encrypted() {
    let dir = TempDir::new().unwrap();
    let file = marker_file(dir.path(), "locked.pdf", 1);
    let engine = Arc::new(ScriptedEngine::new().with_encrypted(&file));
    let service = scripted_service(&engine, dir.path()).await;

    let err = service
        .decrypt(&file, None, &[], None, &CancelToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Encrypted);
    assert_eq!(engine.call_count(ScriptedOp::Decrypt), 0);
}

#[tokio::test]
async fn test_batch_try_empty_dictionary() {
    let manager = PasswordManager::new();
    let err = manager
        .batch_try(Path::new("/docs/a.pdf"), &[], |_pw| async {
            Ok(PathBuf::from("/tmp/out.pdf"))
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encrypted);
}

#[tokio::test]
async fn test_unencrypted_file_is_returned_as_is() {
    let dir = TempDir::new().unwrap();
    let file = marker_file(dir.path(), "plain.pdf", 1);
    let engine = Arc::new(ScriptedEngine::new());
    let service = scripted_service(&engine, dir.path()).await;

    let outcome = service
        .decrypt(&file, None, &words(&["x"]), None, &CancelToken::new())
        .await
        .unwrap();

    assert!(outcome.is_original);
    assert_eq!(outcome.path, file);
    assert_eq!(outcome.attempts, 0);
}

#[tokio::test]
async fn test_cache_file_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("state").join("passwords.json");
    let file = dir.path().join("a.pdf");

    let first = PasswordManager::new();
    first.set(&file, "hunter2");
    store::save_cache(&cache, &first.export_cache()).await.unwrap();

    let second = PasswordManager::new();
    second.import_cache(store::load_cache(&cache).await);
    assert_eq!(second.get(&file).as_deref(), Some("hunter2"));

    std::fs::write(&cache, "not json").unwrap();
    assert!(store::load_cache(&cache).await.is_empty());
}

#[tokio::test]
async fn test_previous_success_is_tried_first_on_another_file() {
    let dir = TempDir::new().unwrap();
    let first = marker_file(dir.path(), "q1.pdf", 1);
    let second = marker_file(dir.path(), "q2.pdf", 1);
    let engine = Arc::new(
        ScriptedEngine::new()
            .with_encrypted(&first)
            .with_encrypted(&second)
            .with_password("finance2024"),
    );
    let service = scripted_service(&engine, dir.path()).await;

    // The built-in dictionary seeds the list until something succeeds.
    let before = service.passwords().optimized_list();
    assert_eq!(before.first().map(String::as_str), Some(""));
    assert!(!before.contains(&"finance2024".to_string()));

    let mut dictionary = before.clone();
    dictionary.push("finance2024".to_string());
    let cracked = service
        .decrypt(&first, None, &dictionary, None, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(cracked.attempts, dictionary.len());

    let ordered = service.passwords().optimized_list();
    assert_eq!(ordered[0], "finance2024");
    assert_eq!(ordered.len(), dictionary.len());

    let later = service
        .decrypt(&second, None, &ordered, None, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(later.attempts, 1);
    assert_eq!(engine.decrypt_passwords().last().map(String::as_str), Some("finance2024"));
}
