// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations for the `lockbox` binary.

use lockbox_config::LockboxConfig;
use lockbox_core::{LockboxError, NodeId, SchemaVersion};
use lockbox_crypto::{get_new_password, get_password};
use lockbox_storage::{check_version, store_path};
use lockbox_vault::{Lockbox, NewNode, Node, generate_password, leetify};
use secrecy::SecretString;
use tracing::debug;

/// Fields for `lockbox add` as given on the command line.
pub struct Entry {
    pub username: String,
    pub url: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub generate: bool,
}

/// Changes for `lockbox edit`. `None` keeps the stored value.
pub struct Changes {
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    /// Replacement tag list. `Some(vec![])` clears every tag.
    pub tags: Option<Vec<String>>,
    /// Prompt for a new entry password.
    pub prompt_password: bool,
    /// Generate a new entry password.
    pub generate: bool,
}

/// Open the configured store and unlock it. Runs any pending migration.
async fn unlock(config: &LockboxConfig) -> Result<Lockbox, LockboxError> {
    let mut lockbox = Lockbox::open(config).await?;
    if !lockbox.is_initialized().await? {
        return Err(LockboxError::NotInitialized);
    }
    let password = get_password("Master password")?;
    if !lockbox.authenticate(&password).await? {
        lockbox.close().await?;
        return Err(LockboxError::WrongPassword);
    }
    Ok(lockbox)
}

fn entry_password(generate: bool, config: &LockboxConfig) -> Result<String, LockboxError> {
    if generate {
        return Ok(generate_password(
            config.generator.length,
            config.generator.symbols,
        ));
    }
    rpassword::prompt_password("Entry password: ")
        .map_err(|e| LockboxError::Internal(format!("failed to read password: {e}")))
}

fn print_node(node: &Node) {
    println!("[{}] {}", node.id, node.username);
    println!("  password: {}", node.password);
    if !node.url.is_empty() {
        println!("  url:      {}", node.url);
    }
    if !node.notes.is_empty() {
        println!("  notes:    {}", node.notes.replace('\n', "\n            "));
    }
    if !node.tags.is_empty() {
        println!("  tags:     {}", node.tags.join(", "));
    }
}

pub async fn init(config: &LockboxConfig) -> Result<(), LockboxError> {
    let mut lockbox = Lockbox::open(config).await?;
    if lockbox.is_initialized().await? {
        lockbox.close().await?;
        return Err(LockboxError::AlreadyInitialized);
    }
    let password = get_new_password("New master password", true)?;
    lockbox.initialize(&password).await?;
    println!("store initialized ({})", lockbox.backend().name());
    lockbox.close().await
}

pub async fn add(config: &LockboxConfig, entry: Entry) -> Result<(), LockboxError> {
    let lockbox = unlock(config).await?;
    let node = NewNode {
        password: entry_password(entry.generate, config)?,
        username: entry.username,
        url: entry.url,
        notes: entry.notes,
        tags: entry.tags,
    };
    let id = lockbox.add_node(&node).await?;
    println!("added {id}");
    if entry.generate {
        println!("password: {}", node.password);
    }
    lockbox.close().await
}

pub async fn edit(
    config: &LockboxConfig,
    id: NodeId,
    changes: Changes,
) -> Result<(), LockboxError> {
    let lockbox = unlock(config).await?;
    let Some(current) = lockbox.get_nodes(&[id]).await?.into_iter().next() else {
        lockbox.close().await?;
        return Err(LockboxError::NodeNotFound(id));
    };

    let mut node = current.to_new();
    if let Some(username) = changes.username {
        node.username = username;
    }
    if let Some(url) = changes.url {
        node.url = url;
    }
    if let Some(notes) = changes.notes {
        node.notes = notes;
    }
    if let Some(tags) = changes.tags {
        node.tags = tags;
    }
    if changes.prompt_password || changes.generate {
        node.password = entry_password(changes.generate, config)?;
    }

    lockbox.edit_node(id, &node).await?;
    println!("updated {id}");
    if changes.generate {
        println!("password: {}", node.password);
    }
    lockbox.close().await
}

pub async fn list(config: &LockboxConfig, tag: Option<&str>) -> Result<(), LockboxError> {
    let lockbox = unlock(config).await?;
    let ids = lockbox.list_nodes(tag).await?;
    for node in lockbox.get_nodes(&ids).await? {
        if node.url.is_empty() {
            println!("{:>5}  {}", node.id, node.username);
        } else {
            println!("{:>5}  {}  ({})", node.id, node.username, node.url);
        }
    }
    debug!(count = ids.len(), "listed nodes");
    lockbox.close().await
}

pub async fn show(config: &LockboxConfig, ids: &[NodeId]) -> Result<(), LockboxError> {
    let lockbox = unlock(config).await?;
    let nodes = lockbox.get_nodes(ids).await?;
    for id in ids {
        if !nodes.iter().any(|n| n.id == *id) {
            eprintln!("lockbox: no credential with id {id}");
        }
    }
    for node in &nodes {
        print_node(node);
    }
    lockbox.close().await
}

pub async fn remove(config: &LockboxConfig, ids: &[NodeId]) -> Result<(), LockboxError> {
    let lockbox = unlock(config).await?;
    lockbox.remove_nodes(ids).await?;
    println!("removed {} credential(s)", ids.len());
    lockbox.close().await
}

pub async fn tags(config: &LockboxConfig) -> Result<(), LockboxError> {
    let lockbox = unlock(config).await?;
    for tag in lockbox.list_tags().await? {
        println!("{tag}");
    }
    lockbox.close().await
}

pub async fn passwd(config: &LockboxConfig) -> Result<(), LockboxError> {
    let mut lockbox = Lockbox::open(config).await?;
    let old: SecretString = get_password("Current master password")?;
    if !lockbox.authenticate(&old).await? {
        lockbox.close().await?;
        return Err(LockboxError::BadCurrentPassword);
    }
    let new = get_new_password("New master password", false)?;
    lockbox.change_password(&old, &new).await?;
    println!("master password changed");
    lockbox.close().await
}

pub async fn migrate(config: &LockboxConfig) -> Result<(), LockboxError> {
    let before = check_version(&config.backend).await?;
    if before == SchemaVersion::CURRENT {
        println!("store is at schema version {before}, nothing to do");
        return Ok(());
    }
    let lockbox = unlock(config).await?;
    let after = lockbox.schema_version().await?;
    println!("store upgraded from schema version {before} to {after}");
    lockbox.close().await
}

pub async fn version(config: &LockboxConfig) -> Result<(), LockboxError> {
    println!("lockbox {}", env!("CARGO_PKG_VERSION"));
    let path = store_path(&config.backend)?;
    let found = check_version(&config.backend).await?;
    println!(
        "store: {} ({}), schema version {found} (current {})",
        config.backend.kind,
        path.display(),
        SchemaVersion::CURRENT
    );
    Ok(())
}

pub fn generate(config: &LockboxConfig, length: Option<usize>, symbols: bool, leet: bool) {
    let password = generate_password(length.unwrap_or(config.generator.length), symbols);
    println!("{password}");
    if leet {
        println!("{}", leetify(&password));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_crypto::MASTER_KEY_ENV_VAR;
    use lockbox_storage::document::{Document, write_document};
    use serial_test::serial;

    const KEY: &str = "correct-key";

    fn config_at(dir: &std::path::Path) -> LockboxConfig {
        let mut config = LockboxConfig::default();
        config.backend.kind = "document".into();
        config.backend.path = Some(dir.join("store.json").to_string_lossy().into_owned());
        config.crypto.kdf_memory_cost = 32768;
        config.crypto.kdf_iterations = 2;
        config.crypto.kdf_parallelism = 1;
        config
    }

    /// Sets the master key variable until dropped.
    struct MasterKey;

    impl MasterKey {
        fn set(value: &str) -> Self {
            // SAFETY: test-only env mutation, serialized with the other env tests.
            unsafe { std::env::set_var(MASTER_KEY_ENV_VAR, value) };
            Self
        }
    }

    impl Drop for MasterKey {
        fn drop(&mut self) {
            unsafe { std::env::remove_var(MASTER_KEY_ENV_VAR) };
        }
    }

    async fn unlocked(config: &LockboxConfig) -> Lockbox {
        let mut lockbox = Lockbox::open(config).await.unwrap();
        let key = SecretString::from(KEY.to_string());
        assert!(lockbox.authenticate(&key).await.unwrap());
        lockbox
    }

    fn alice(tags: &[&str]) -> Entry {
        Entry {
            username: "alice".into(),
            url: "example.org".into(),
            notes: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            generate: true,
        }
    }

    #[tokio::test]
    async fn version_reports_a_new_store_as_current() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        version(&config).await.unwrap();
        assert_eq!(
            check_version(&config.backend).await.unwrap(),
            SchemaVersion::CURRENT
        );
    }

    #[tokio::test]
    async fn migrate_on_a_current_store_needs_no_password() {
        let dir = tempfile::tempdir().unwrap();
        migrate(&config_at(dir.path())).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_backend_kind_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_at(dir.path());
        config.backend.kind = "mongo".into();
        assert!(matches!(
            version(&config).await,
            Err(LockboxError::UnknownBackend(kind)) if kind == "mongo"
        ));
    }

    #[tokio::test]
    #[serial]
    async fn credential_lifecycle_through_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        let _key = MasterKey::set(KEY);

        init(&config).await.unwrap();
        assert!(matches!(
            init(&config).await,
            Err(LockboxError::AlreadyInitialized)
        ));

        add(&config, alice(&["work", "mail"])).await.unwrap();
        tags(&config).await.unwrap();
        list(&config, Some("work")).await.unwrap();

        let lockbox = unlocked(&config).await;
        let ids = lockbox.list_nodes(Some("work")).await.unwrap();
        assert_eq!(ids.len(), 1);
        let id = ids[0];
        let added = lockbox.get_nodes(&[id]).await.unwrap().remove(0);
        assert_eq!(added.username, "alice");
        assert_eq!(added.password.chars().count(), config.generator.length);
        assert_eq!(lockbox.list_tags().await.unwrap(), vec!["mail", "work"]);
        lockbox.close().await.unwrap();

        let changes = Changes {
            username: None,
            url: Some("mail.example.org".into()),
            notes: Some("second account".into()),
            tags: Some(vec!["home".into()]),
            prompt_password: false,
            generate: true,
        };
        edit(&config, id, changes).await.unwrap();
        show(&config, &[id]).await.unwrap();

        let lockbox = unlocked(&config).await;
        let edited = lockbox.get_nodes(&[id]).await.unwrap().remove(0);
        assert_eq!(edited.username, "alice");
        assert_eq!(edited.url, "mail.example.org");
        assert_eq!(edited.notes, "second account");
        assert_eq!(edited.tags, vec!["home"]);
        assert_ne!(edited.password, added.password);
        assert_eq!(lockbox.list_tags().await.unwrap(), vec!["home"]);
        lockbox.close().await.unwrap();

        remove(&config, &[id]).await.unwrap();
        let lockbox = unlocked(&config).await;
        assert!(lockbox.list_nodes(None).await.unwrap().is_empty());
        assert!(lockbox.list_tags().await.unwrap().is_empty());
        lockbox.close().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn edit_keeps_unchanged_fields_and_rejects_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        let _key = MasterKey::set(KEY);
        init(&config).await.unwrap();
        add(&config, alice(&["work"])).await.unwrap();

        let lockbox = unlocked(&config).await;
        let id = lockbox.list_nodes(None).await.unwrap()[0];
        let before = lockbox.get_nodes(&[id]).await.unwrap().remove(0);
        lockbox.close().await.unwrap();

        let rename = Changes {
            username: Some("alice@example.org".into()),
            url: None,
            notes: None,
            tags: None,
            prompt_password: false,
            generate: false,
        };
        edit(&config, id, rename).await.unwrap();

        let lockbox = unlocked(&config).await;
        let after = lockbox.get_nodes(&[id]).await.unwrap().remove(0);
        assert_eq!(after.username, "alice@example.org");
        assert_eq!(after.password, before.password);
        assert_eq!(after.url, before.url);
        assert_eq!(after.tags, before.tags);
        lockbox.close().await.unwrap();

        let missing = NodeId(id.0 + 100);
        let nothing = Changes {
            username: None,
            url: None,
            notes: None,
            tags: Some(Vec::new()),
            prompt_password: false,
            generate: false,
        };
        assert!(matches!(
            edit(&config, missing, nothing).await,
            Err(LockboxError::NodeNotFound(found)) if found == missing
        ));
    }

    #[tokio::test]
    #[serial]
    async fn wrong_master_key_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        {
            let _key = MasterKey::set(KEY);
            init(&config).await.unwrap();
        }

        let _key = MasterKey::set("wrong-key");
        let err = tags(&config).await.unwrap_err();
        assert!(matches!(err, LockboxError::WrongPassword));
        assert_eq!(err.to_string(), "wrong master password");
    }

    #[tokio::test]
    #[serial]
    async fn commands_on_a_new_store_need_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        let _key = MasterKey::set(KEY);
        assert!(matches!(
            add(&config, alice(&[])).await,
            Err(LockboxError::NotInitialized)
        ));
    }

    #[tokio::test]
    #[serial]
    async fn migrate_upgrades_an_inline_tag_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        let _key = MasterKey::set(KEY);
        init(&config).await.unwrap();
        add(&config, alice(&["work", "mail"])).await.unwrap();

        // Rewrite the file in the older layout: tags only inline on each node.
        let path = store_path(&config.backend).unwrap();
        let mut doc: Document = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        doc.version = SchemaVersion::INLINE_TAGS;
        doc.tags.clear();
        write_document(&path, &doc).await.unwrap();
        assert_eq!(
            check_version(&config.backend).await.unwrap(),
            SchemaVersion::INLINE_TAGS
        );

        migrate(&config).await.unwrap();

        assert_eq!(
            check_version(&config.backend).await.unwrap(),
            SchemaVersion::CURRENT
        );
        let lockbox = unlocked(&config).await;
        assert_eq!(lockbox.list_tags().await.unwrap(), vec!["mail", "work"]);
        assert_eq!(lockbox.list_nodes(Some("mail")).await.unwrap().len(), 1);
        lockbox.close().await.unwrap();
    }
}
