// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plaintext credential records and their sealed form.
//!
//! A record only becomes storable through [`NewNode::seal`] and only becomes
//! readable through [`Node::open`]. Both go through the [`CryptoEngine`], one
//! field at a time.

use lockbox_core::{LockboxError, NodeId, SealedFields, SealedNode, StoredNode};
use lockbox_crypto::CryptoEngine;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Trim labels and drop empty ones and repeats, keeping first-seen order.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// A credential as entered by the user, before it has an id.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct NewNode {
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
    pub tags: Vec<String>,
}

impl std::fmt::Debug for NewNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewNode")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .field("tags", &self.tags)
            .finish()
    }
}

impl NewNode {
    /// Encrypt every field, and every tag deterministically.
    pub fn seal(&self, engine: &CryptoEngine) -> Result<SealedNode, LockboxError> {
        let fields = SealedFields {
            username: engine.encrypt(&self.username)?,
            password: engine.encrypt(&self.password)?,
            url: engine.encrypt(&self.url)?,
            notes: engine.encrypt(&self.notes)?,
        };
        let tags = normalize_tags(&self.tags)
            .iter()
            .map(|tag| engine.encrypt_tag(tag))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SealedNode { fields, tags })
    }
}

/// A stored credential, decrypted.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Node {
    #[zeroize(skip)]
    pub id: NodeId,
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
    pub tags: Vec<String>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .field("tags", &self.tags)
            .finish()
    }
}

impl Node {
    /// Decrypt a stored node. Any field failing to decrypt fails the whole node.
    pub fn open(stored: &StoredNode, engine: &CryptoEngine) -> Result<Self, LockboxError> {
        Ok(Self {
            id: stored.id,
            username: engine.decrypt(&stored.fields.username)?,
            password: engine.decrypt(&stored.fields.password)?,
            url: engine.decrypt(&stored.fields.url)?,
            notes: engine.decrypt(&stored.fields.notes)?,
            tags: stored
                .tags
                .iter()
                .map(|tag| engine.decrypt(tag))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    /// The editable part of this record.
    pub fn to_new(&self) -> NewNode {
        NewNode {
            username: self.username.clone(),
            password: self.password.clone(),
            url: self.url.clone(),
            notes: self.notes.clone(),
            tags: self.tags.clone(),
        }
    }
}

const FIELD_END: &str = "##";
const TAG_START: &str = "tag:";
const TAG_END: &str = "**endtag**";

/// Text layout of a version-1 record, the plaintext inside its single blob:
///
/// ```text
/// username:alice##password:s3cret##url:example.org##notes:##tags:tag:work**endtag**
/// ```
pub fn to_packed(node: &NewNode) -> String {
    let mut out = format!(
        "username:{}{FIELD_END}password:{}{FIELD_END}url:{}{FIELD_END}notes:{}{FIELD_END}tags:",
        node.username, node.password, node.url, node.notes
    );
    for tag in normalize_tags(&node.tags) {
        out.push_str(TAG_START);
        out.push_str(&tag);
        out.push_str(TAG_END);
    }
    out
}

/// Parse the version-1 text layout back into a record.
pub fn parse_packed(id: NodeId, text: &str) -> Result<NewNode, LockboxError> {
    let corrupted = |what: &str| LockboxError::Corrupted(format!("packed node {id}: {what}"));

    let rest = text
        .strip_prefix("username:")
        .ok_or_else(|| corrupted("missing username"))?;
    let (username, rest) = rest
        .split_once("##password:")
        .ok_or_else(|| corrupted("missing password"))?;
    let (password, rest) = rest
        .split_once("##url:")
        .ok_or_else(|| corrupted("missing url"))?;
    let (url, rest) = rest
        .split_once("##notes:")
        .ok_or_else(|| corrupted("missing notes"))?;
    // Notes are free text; the tag section is always last.
    let (notes, tags) = rest
        .rsplit_once("##tags:")
        .ok_or_else(|| corrupted("missing tags"))?;

    let tags = tags
        .split(TAG_END)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            chunk
                .strip_prefix(TAG_START)
                .map(str::to_string)
                .ok_or_else(|| corrupted("malformed tag"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NewNode {
        username: username.to_string(),
        password: password.to_string(),
        url: url.to_string(),
        notes: notes.to_string(),
        tags: normalize_tags(&tags),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> NewNode {
        NewNode {
            username: "alice".into(),
            password: "s3cret".into(),
            url: "example.org".into(),
            notes: "line one\nline ## two".into(),
            tags: vec!["work".into(), " work ".into(), "".into(), "mail".into()],
        }
    }

    #[test]
    fn tags_are_normalized() {
        assert_eq!(normalize_tags(&alice().tags), vec!["work", "mail"]);
    }

    #[test]
    fn packed_text_layout() {
        let node = NewNode {
            username: "alice".into(),
            password: "s3cret".into(),
            url: "example.org".into(),
            notes: String::new(),
            tags: vec!["work".into()],
        };
        assert_eq!(
            to_packed(&node),
            "username:alice##password:s3cret##url:example.org##notes:##tags:tag:work**endtag**"
        );
    }

    #[test]
    fn packed_parse_keeps_separators_inside_notes() {
        let parsed = parse_packed(NodeId(1), &to_packed(&alice())).unwrap();
        assert_eq!(parsed.notes, "line one\nline ## two");
        assert_eq!(parsed.tags, vec!["work", "mail"]);
        assert_eq!(parsed.password, "s3cret");
    }

    #[test]
    fn packed_parse_without_tags() {
        let parsed =
            parse_packed(NodeId(2), "username:u##password:p##url:x##notes:n##tags:").unwrap();
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.url, "x");
    }

    #[test]
    fn packed_parse_rejects_garbage() {
        let err = parse_packed(NodeId(5), "user=alice").unwrap_err();
        assert!(matches!(err, LockboxError::Corrupted(msg) if msg.contains("node 5")));
    }

    #[test]
    fn debug_hides_password() {
        let debug = format!("{:?}", alice());
        assert!(!debug.contains("s3cret"));
    }
}
