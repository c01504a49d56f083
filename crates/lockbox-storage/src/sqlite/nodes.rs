// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Node, tag and key-material queries for the current layout.
//!
//! Plain synchronous functions over a `rusqlite::Connection` so they can run
//! inside a single tokio-rusqlite call, and inside a transaction when
//! batched.

use std::collections::BTreeSet;

use lockbox_core::{CipherText, LegacyNode, NodeId, SealedFields, SealedNode, StoredNode};
use rusqlite::{Connection, OptionalExtension, params};

use super::schema::INLINE_TAG_SEPARATOR;

pub(crate) const KEY_VERIFIER: &str = "verifier";
pub(crate) const KEY_CRYPTO_INFO: &str = "crypto_info";

/// Insert a node row. `id` is assigned by SQLite unless given.
pub(crate) fn insert_node(
    conn: &Connection,
    id: Option<NodeId>,
    fields: &SealedFields,
) -> rusqlite::Result<NodeId> {
    conn.execute(
        "INSERT INTO node (id, username, password, url, notes) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.map(|id| id.0),
            fields.username.as_str(),
            fields.password.as_str(),
            fields.url.as_str(),
            fields.notes.as_str(),
        ],
    )?;
    Ok(NodeId(conn.last_insert_rowid()))
}

/// Resolve a tag to its row id, creating it if no equal ciphertext exists.
fn get_or_create_tag(conn: &Connection, tag: &CipherText) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO tag (data) VALUES (?1)",
        params![tag.as_str()],
    )?;
    conn.query_row(
        "SELECT id FROM tag WHERE data = ?1",
        params![tag.as_str()],
        |row| row.get(0),
    )
}

pub(crate) fn link_tags(conn: &Connection, id: NodeId, tags: &[CipherText]) -> rusqlite::Result<()> {
    for tag in tags {
        let tag_id = get_or_create_tag(conn, tag)?;
        conn.execute(
            "INSERT OR IGNORE INTO lookup (nodeid, tagid) VALUES (?1, ?2)",
            params![id.0, tag_id],
        )?;
    }
    Ok(())
}

/// Delete every tag no node links to.
fn clean_orphans(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM tag WHERE id NOT IN (SELECT DISTINCT tagid FROM lookup)",
        [],
    )
}

pub(crate) fn add_node(conn: &Connection, node: &SealedNode) -> rusqlite::Result<NodeId> {
    let id = insert_node(conn, None, &node.fields)?;
    link_tags(conn, id, &node.tags)?;
    Ok(id)
}

/// Replace a node's fields and links. `false` if no node has this id.
pub(crate) fn replace_node(
    conn: &Connection,
    id: NodeId,
    node: &SealedNode,
) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE node SET username = ?1, password = ?2, url = ?3, notes = ?4 WHERE id = ?5",
        params![
            node.fields.username.as_str(),
            node.fields.password.as_str(),
            node.fields.url.as_str(),
            node.fields.notes.as_str(),
            id.0,
        ],
    )?;
    if updated == 0 {
        return Ok(false);
    }
    conn.execute("DELETE FROM lookup WHERE nodeid = ?1", params![id.0])?;
    link_tags(conn, id, &node.tags)?;
    clean_orphans(conn)?;
    Ok(true)
}

pub(crate) fn get_node(conn: &Connection, id: NodeId) -> rusqlite::Result<Option<StoredNode>> {
    let fields = conn
        .query_row(
            "SELECT username, password, url, notes FROM node WHERE id = ?1",
            params![id.0],
            |row| {
                Ok(SealedFields {
                    username: CipherText::from_encoded(row.get::<_, String>(0)?),
                    password: CipherText::from_encoded(row.get::<_, String>(1)?),
                    url: CipherText::from_encoded(row.get::<_, String>(2)?),
                    notes: CipherText::from_encoded(row.get::<_, String>(3)?),
                })
            },
        )
        .optional()?;
    let Some(fields) = fields else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT tag.data FROM lookup JOIN tag ON tag.id = lookup.tagid
         WHERE lookup.nodeid = ?1 ORDER BY lookup.rowid",
    )?;
    let tags = stmt
        .query_map(params![id.0], |row| row.get::<_, String>(0))?
        .map(|r| r.map(CipherText::from_encoded))
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(StoredNode { id, fields, tags }))
}

pub(crate) fn list_ids(conn: &Connection, tag: Option<&str>) -> rusqlite::Result<Vec<NodeId>> {
    let ids = match tag {
        Some(tag) => {
            let mut stmt = conn.prepare(
                "SELECT lookup.nodeid FROM lookup JOIN tag ON tag.id = lookup.tagid
                 WHERE tag.data = ?1 ORDER BY lookup.nodeid",
            )?;
            stmt.query_map(params![tag], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?
        }
        None => {
            let mut stmt = conn.prepare("SELECT id FROM node ORDER BY id")?;
            stmt.query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?
        }
    };
    Ok(ids.into_iter().map(NodeId).collect())
}

/// Delete nodes (links cascade) and then every orphaned tag.
pub(crate) fn delete_nodes(conn: &Connection, ids: &[NodeId]) -> rusqlite::Result<usize> {
    let mut removed = 0;
    for id in ids {
        removed += conn.execute("DELETE FROM node WHERE id = ?1", params![id.0])?;
    }
    clean_orphans(conn)?;
    Ok(removed)
}

pub(crate) fn list_tags(conn: &Connection) -> rusqlite::Result<BTreeSet<CipherText>> {
    let mut stmt =
        conn.prepare("SELECT data FROM tag WHERE id IN (SELECT DISTINCT tagid FROM lookup)")?;
    let tags = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .map(|r| r.map(CipherText::from_encoded))
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(tags)
}

pub(crate) fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM crypto WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn put_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO crypto (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

/// Every row of a v1 store.
pub(crate) fn read_packed(conn: &Connection) -> rusqlite::Result<Vec<LegacyNode>> {
    let mut stmt = conn.prepare("SELECT id, data FROM node ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(LegacyNode::Packed {
            id: NodeId(row.get(0)?),
            blob: CipherText::from_encoded(row.get::<_, String>(1)?),
        })
    })?;
    rows.collect()
}

/// Every row of a v2 store, inline tags split but not de-duplicated.
pub(crate) fn read_inline(conn: &Connection) -> rusqlite::Result<Vec<LegacyNode>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, url, notes, tags FROM node ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        let tags: String = row.get(5)?;
        Ok(LegacyNode::Inline(StoredNode {
            id: NodeId(row.get(0)?),
            fields: SealedFields {
                username: CipherText::from_encoded(row.get::<_, String>(1)?),
                password: CipherText::from_encoded(row.get::<_, String>(2)?),
                url: CipherText::from_encoded(row.get::<_, String>(3)?),
                notes: CipherText::from_encoded(row.get::<_, String>(4)?),
            },
            tags: tags
                .split(INLINE_TAG_SEPARATOR)
                .filter(|t| !t.is_empty())
                .map(CipherText::from_encoded)
                .collect(),
        }))
    })?;
    rows.collect()
}
