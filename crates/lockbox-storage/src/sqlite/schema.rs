// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table layouts for every schema version, plus the version marker.
//!
//! `dbversion` and `crypto` keep the same shape in every version. Only the
//! node storage changes:
//!
//! - v1: `node(id, data)`, one packed ciphertext per row.
//! - v2: `node(id, username, password, url, notes, tags)`, tags as a
//!   comma-joined list of ciphertexts.
//! - v3: `node`, `tag`, and the `lookup` join table.

use lockbox_core::{SchemaVersion, StoredNode};
use rusqlite::{Connection, OptionalExtension, params};

use super::nodes;

const META_DDL: &str = "
CREATE TABLE IF NOT EXISTS dbversion (
    version INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS crypto (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);";

const PACKED_DDL: &str = "
CREATE TABLE node (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    data TEXT NOT NULL
);";

const INLINE_TAGS_DDL: &str = "
CREATE TABLE node (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    password TEXT NOT NULL,
    url      TEXT NOT NULL,
    notes    TEXT NOT NULL,
    tags     TEXT NOT NULL DEFAULT ''
);";

const NORMALIZED_TAGS_DDL: &str = "
CREATE TABLE node (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    password TEXT NOT NULL,
    url      TEXT NOT NULL,
    notes    TEXT NOT NULL
);
CREATE TABLE tag (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    data TEXT NOT NULL UNIQUE
);
CREATE TABLE lookup (
    nodeid INTEGER NOT NULL REFERENCES node(id) ON DELETE CASCADE,
    tagid  INTEGER NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
    PRIMARY KEY (nodeid, tagid)
);
CREATE INDEX lookup_tagid ON lookup(tagid);";

/// Separator for inline tag lists. Never appears in base64 text.
pub(crate) const INLINE_TAG_SEPARATOR: char = ',';

/// Node-table DDL for `version`, if this build knows the layout.
pub(crate) fn node_ddl(version: SchemaVersion) -> Option<&'static str> {
    match version {
        SchemaVersion::PACKED => Some(PACKED_DDL),
        SchemaVersion::INLINE_TAGS => Some(INLINE_TAGS_DDL),
        SchemaVersion::NORMALIZED_TAGS => Some(NORMALIZED_TAGS_DDL),
        _ => None,
    }
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Stored version marker, `None` if the store carries none.
pub(crate) fn read_version(conn: &Connection) -> rusqlite::Result<Option<SchemaVersion>> {
    if !table_exists(conn, "dbversion")? {
        return Ok(None);
    }
    let version: Option<u32> = conn
        .query_row("SELECT version FROM dbversion LIMIT 1", [], |row| row.get(0))
        .optional()?;
    Ok(version.map(SchemaVersion))
}

pub(crate) fn write_version(conn: &Connection, version: SchemaVersion) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM dbversion", [])?;
    conn.execute("INSERT INTO dbversion (version) VALUES (?1)", params![version.0])?;
    Ok(())
}

/// Read the version marker, creating an empty current-layout store first if
/// the file holds no tables at all.
///
/// A file with a `node` table but no marker predates versioning and is
/// reported as version 0, which no code path accepts.
pub(crate) fn bootstrap(conn: &mut Connection) -> rusqlite::Result<SchemaVersion> {
    if let Some(version) = read_version(conn)? {
        return Ok(version);
    }
    if table_exists(conn, "node")? {
        return Ok(SchemaVersion(0));
    }

    let tx = conn.transaction()?;
    tx.execute_batch(META_DDL)?;
    tx.execute_batch(NORMALIZED_TAGS_DDL)?;
    write_version(&tx, SchemaVersion::CURRENT)?;
    tx.commit()?;
    Ok(SchemaVersion::CURRENT)
}

/// Create a store directly in a given layout. Used to build legacy fixtures.
pub fn create_layout(conn: &mut Connection, version: SchemaVersion) -> rusqlite::Result<()> {
    let ddl = node_ddl(version).ok_or(rusqlite::Error::InvalidQuery)?;
    let tx = conn.transaction()?;
    tx.execute_batch(META_DDL)?;
    tx.execute_batch(ddl)?;
    write_version(&tx, version)?;
    tx.commit()
}

/// Highest id ever handed out for `node`, if SQLite has recorded one.
fn node_sequence(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    if !table_exists(conn, "sqlite_sequence")? {
        return Ok(None);
    }
    conn.query_row(
        "SELECT seq FROM sqlite_sequence WHERE name = 'node'",
        [],
        |row| row.get(0),
    )
    .optional()
}

/// Raise the `node` sequence to at least `seq`. `sqlite_sequence` has no
/// unique key on `name`, so the row is replaced rather than upserted.
fn restore_node_sequence(conn: &Connection, seq: i64) -> rusqlite::Result<()> {
    let current = node_sequence(conn)?.unwrap_or(0);
    conn.execute("DELETE FROM sqlite_sequence WHERE name = 'node'", [])?;
    conn.execute(
        "INSERT INTO sqlite_sequence (name, seq) VALUES ('node', ?1)",
        params![seq.max(current)],
    )?;
    Ok(())
}

/// Replace the node storage with `target`'s layout holding `nodes`, keeping
/// their ids. Runs inside the caller's transaction.
///
/// Dropping `node` discards its autoincrement counter, so the old high-water
/// mark is carried over. Ids of deleted nodes are never handed out again.
pub(crate) fn rewrite_layout(
    conn: &Connection,
    target: SchemaVersion,
    stored: &[StoredNode],
) -> rusqlite::Result<()> {
    let ddl = node_ddl(target).ok_or(rusqlite::Error::InvalidQuery)?;
    let sequence = node_sequence(conn)?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS lookup;
         DROP TABLE IF EXISTS tag;
         DROP TABLE IF EXISTS node;",
    )?;
    conn.execute_batch(ddl)?;

    for node in stored {
        match target {
            SchemaVersion::INLINE_TAGS => {
                let tags = node
                    .tags
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(&INLINE_TAG_SEPARATOR.to_string());
                conn.execute(
                    "INSERT INTO node (id, username, password, url, notes, tags)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        node.id.0,
                        node.fields.username.as_str(),
                        node.fields.password.as_str(),
                        node.fields.url.as_str(),
                        node.fields.notes.as_str(),
                        tags,
                    ],
                )?;
            }
            SchemaVersion::NORMALIZED_TAGS => {
                nodes::insert_node(conn, Some(node.id), &node.fields)?;
                nodes::link_tags(conn, node.id, &node.tags)?;
            }
            _ => return Err(rusqlite::Error::InvalidQuery),
        }
    }
    if let Some(seq) = sequence {
        restore_node_sequence(conn, seq)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_current_layout_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(bootstrap(&mut conn).unwrap(), SchemaVersion::CURRENT);
        assert_eq!(bootstrap(&mut conn).unwrap(), SchemaVersion::CURRENT);
        assert!(table_exists(&conn, "lookup").unwrap());
    }

    #[test]
    fn unversioned_node_table_is_version_zero() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(PACKED_DDL).unwrap();
        assert_eq!(bootstrap(&mut conn).unwrap(), SchemaVersion(0));
    }

    #[test]
    fn rewrite_keeps_the_node_sequence() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_layout(&mut conn, SchemaVersion::INLINE_TAGS).unwrap();
        conn.execute_batch(
            "INSERT INTO node (username, password, url, notes) VALUES ('a', 'b', 'c', 'd');
             INSERT INTO node (username, password, url, notes) VALUES ('a', 'b', 'c', 'd');
             DELETE FROM node WHERE id = 2;",
        )
        .unwrap();
        assert_eq!(node_sequence(&conn).unwrap(), Some(2));

        rewrite_layout(&conn, SchemaVersion::CURRENT, &[]).unwrap();
        assert_eq!(node_sequence(&conn).unwrap(), Some(2));
        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_sequence WHERE name = 'node'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn legacy_layout_keeps_its_marker() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_layout(&mut conn, SchemaVersion::PACKED).unwrap();
        assert_eq!(bootstrap(&mut conn).unwrap(), SchemaVersion::PACKED);
        assert!(!table_exists(&conn, "tag").unwrap());
    }
}
