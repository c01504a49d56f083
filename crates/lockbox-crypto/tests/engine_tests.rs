// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CryptoEngine session lifecycle against a real backend.

use lockbox_core::{CipherText, KdfParams, LockboxError, SealedFields, SealedNode, StorageBackend};
use lockbox_crypto::CryptoEngine;
use lockbox_storage::DocumentBackend;
use secrecy::SecretString;
use tempfile::TempDir;

const PARAMS: KdfParams = KdfParams {
    memory_cost: 32768,
    iterations: 2,
    parallelism: 1,
};

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

async fn store() -> (TempDir, DocumentBackend) {
    let dir = tempfile::tempdir().unwrap();
    let backend = DocumentBackend::new(dir.path().join("store.json"));
    backend.open().await.unwrap();
    (dir, backend)
}

fn sealed(engine: &CryptoEngine, password: &str, tags: &[&str]) -> SealedNode {
    SealedNode {
        fields: SealedFields {
            username: engine.encrypt("alice").unwrap(),
            password: engine.encrypt(password).unwrap(),
            url: engine.encrypt("example.org").unwrap(),
            notes: engine.encrypt("").unwrap(),
        },
        tags: tags.iter().map(|t| engine.encrypt_tag(t).unwrap()).collect(),
    }
}

#[tokio::test]
async fn initialize_unlocks_and_persists_the_verifier() {
    let (_dir, store) = store().await;
    let mut engine = CryptoEngine::new(PARAMS);
    assert!(!engine.is_initialized(&store).await.unwrap());

    let verifier = engine.initialize(&store, &secret("correct-key")).await.unwrap();

    assert!(engine.is_authenticated());
    assert!(engine.is_initialized(&store).await.unwrap());
    assert_eq!(store.load_key().await.unwrap(), Some(verifier));
    let info = store.fetch_crypto_info().await.unwrap().unwrap();
    assert_eq!(info.algorithm, "AES-256-GCM");
    assert_eq!(info.kdf, PARAMS);
}

#[tokio::test]
async fn second_initialize_is_refused() {
    let (_dir, store) = store().await;
    let mut engine = CryptoEngine::new(PARAMS);
    engine.initialize(&store, &secret("one")).await.unwrap();
    let before = store.load_key().await.unwrap();

    let mut other = CryptoEngine::new(PARAMS);
    assert!(matches!(
        other.initialize(&store, &secret("two")).await,
        Err(LockboxError::AlreadyInitialized)
    ));
    assert!(!other.is_authenticated());
    assert_eq!(store.load_key().await.unwrap(), before);
}

#[tokio::test]
async fn authenticate_before_initialize_fails() {
    let (_dir, store) = store().await;
    let mut engine = CryptoEngine::new(PARAMS);
    assert!(matches!(
        engine.authenticate(&store, &secret("anything")).await,
        Err(LockboxError::NotInitialized)
    ));
}

#[tokio::test]
async fn wrong_password_leaves_the_engine_locked() {
    let (_dir, store) = store().await;
    let mut engine = CryptoEngine::new(PARAMS);
    engine.initialize(&store, &secret("correct-key")).await.unwrap();

    assert!(!engine.authenticate(&store, &secret("wrong-key")).await.unwrap());
    assert!(!engine.is_authenticated());
    assert!(matches!(engine.encrypt("x"), Err(LockboxError::NotAuthenticated)));

    assert!(engine.authenticate(&store, &secret("correct-key")).await.unwrap());
    assert!(engine.is_authenticated());
}

#[tokio::test]
async fn stored_kdf_cost_wins_over_configured_cost() {
    let (_dir, store) = store().await;
    let mut first = CryptoEngine::new(PARAMS);
    first.initialize(&store, &secret("correct-key")).await.unwrap();
    let ct = first.encrypt("payload").unwrap();

    // A session configured with a different cost still derives the same key.
    let mut second = CryptoEngine::new(KdfParams {
        iterations: 3,
        ..PARAMS
    });
    assert!(second.authenticate(&store, &secret("correct-key")).await.unwrap());
    assert_eq!(second.decrypt(&ct).unwrap(), "payload");
}

#[tokio::test]
async fn ciphertext_does_not_survive_a_new_key() {
    let (_dir_a, store_a) = store().await;
    let (_dir_b, store_b) = store().await;
    let mut a = CryptoEngine::new(PARAMS);
    let mut b = CryptoEngine::new(PARAMS);
    a.initialize(&store_a, &secret("same")).await.unwrap();
    b.initialize(&store_b, &secret("same")).await.unwrap();

    // Same password, different salt.
    let ct = a.encrypt("payload").unwrap();
    assert!(matches!(b.decrypt(&ct), Err(LockboxError::DecryptionFailed)));
    assert_ne!(a.encrypt_tag("work").unwrap(), b.encrypt_tag("work").unwrap());
    assert_eq!(a.encrypt_tag("work").unwrap(), a.encrypt_tag("work").unwrap());
}

#[tokio::test]
async fn change_password_reseals_every_node() {
    let (_dir, store) = store().await;
    let mut engine = CryptoEngine::new(PARAMS);
    engine.initialize(&store, &secret("old")).await.unwrap();
    let id = store
        .add_node(&sealed(&engine, "s3cret", &["work", "mail"]))
        .await
        .unwrap();
    let old_tag = engine.encrypt_tag("work").unwrap();

    engine
        .change_password(&store, &secret("old"), &secret("new"))
        .await
        .unwrap();

    let node = &store.get_nodes(&[id]).await.unwrap()[0];
    assert_eq!(engine.decrypt(&node.fields.password).unwrap(), "s3cret");
    let new_tag = engine.encrypt_tag("work").unwrap();
    assert_ne!(new_tag, old_tag);
    assert_eq!(store.list_nodes(Some(&new_tag)).await.unwrap(), vec![id]);
    assert!(store.list_nodes(Some(&old_tag)).await.unwrap().is_empty());
    assert_eq!(store.list_tags().await.unwrap().len(), 2);

    engine.lock();
    assert!(!engine.authenticate(&store, &secret("old")).await.unwrap());
    assert!(engine.authenticate(&store, &secret("new")).await.unwrap());
}

#[tokio::test]
async fn change_password_checks_the_current_password() {
    let (_dir, store) = store().await;
    let mut engine = CryptoEngine::new(PARAMS);
    engine.initialize(&store, &secret("old")).await.unwrap();
    let before = store.load_key().await.unwrap();

    assert!(matches!(
        engine
            .change_password(&store, &secret("guess"), &secret("new"))
            .await,
        Err(LockboxError::BadCurrentPassword)
    ));
    assert!(engine.is_authenticated());
    assert_eq!(store.load_key().await.unwrap(), before);
}

#[tokio::test]
async fn change_password_needs_an_unlocked_session() {
    let (_dir, store) = store().await;
    let mut engine = CryptoEngine::new(PARAMS);
    engine.initialize(&store, &secret("old")).await.unwrap();
    engine.lock();

    assert!(matches!(
        engine
            .change_password(&store, &secret("old"), &secret("new"))
            .await,
        Err(LockboxError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn undecryptable_node_aborts_the_rekey() {
    let (_dir, store) = store().await;
    let mut engine = CryptoEngine::new(PARAMS);
    engine.initialize(&store, &secret("old")).await.unwrap();
    let good = store.add_node(&sealed(&engine, "fine", &["work"])).await.unwrap();
    let mut broken = sealed(&engine, "fine", &[]);
    broken.fields.notes = CipherText::from_bytes(&[7u8; 40]);
    let bad = store.add_node(&broken).await.unwrap();

    let key_before = store.load_key().await.unwrap();
    let nodes_before = store.get_nodes(&[good, bad]).await.unwrap();

    assert!(matches!(
        engine
            .change_password(&store, &secret("old"), &secret("new"))
            .await,
        Err(LockboxError::DecryptionFailed)
    ));

    assert_eq!(store.load_key().await.unwrap(), key_before);
    assert_eq!(store.get_nodes(&[good, bad]).await.unwrap(), nodes_before);
    // The session keeps the old key.
    assert_eq!(
        engine.decrypt(&nodes_before[0].fields.password).unwrap(),
        "fine"
    );
}
