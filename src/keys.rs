use std::collections::HashMap;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The set of upload keys accepted by one config snapshot.
///
/// Keys are held as SHA-256 digests so every comparison runs over the same
/// 32 bytes, and `validate` checks all of them without short-circuiting.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    entries: HashMap<String, Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    digest: [u8; 32],
    comment: Option<String>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the config file's `{ "key": "comment" }` mapping and the
    /// comma separated environment list.
    pub fn from_sources<'a, I>(configured: I, env_list: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut store = Self::new();
        for (key, comment) in configured {
            let comment = (!comment.is_empty()).then(|| comment.clone());
            store.insert(key, comment);
        }
        if let Some(list) = env_list {
            for key in list.split(',').map(str::trim) {
                store.insert(key, None);
            }
        }
        store
    }

    /// Add a key. Empty keys are ignored; an existing comment is kept when
    /// the same key is added again without one.
    pub fn insert(&mut self, key: &str, comment: Option<String>) {
        if key.is_empty() {
            return;
        }
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            digest: digest(key),
            comment: None,
        });
        if comment.is_some() {
            entry.comment = comment;
        }
    }

    pub fn validate(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        let presented = digest(key);
        let mut found = subtle::Choice::from(0u8);
        for entry in self.entries.values() {
            found |= entry.digest[..].ct_eq(&presented[..]);
        }
        found.into()
    }

    pub fn comment(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|e| e.comment.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}
