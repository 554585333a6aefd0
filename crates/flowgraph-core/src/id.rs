//! Node identifiers.
//!
//! Flow graphs are keyed by opaque string identifiers. [`NodeId`] wraps the
//! string so that node ids cannot be confused with flow ids or attribute
//! keys at the type level.

use std::borrow::Borrow;
use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reserved identifier of the entry node. It owns the top-level order.
pub const ROOT_NODE_KEY: &str = "_root";

/// Length of identifiers produced by [`NodeId::random`].
const GENERATED_ID_LEN: usize = 10;

/// Identifier of a node within one flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// The `_root` identifier.
    pub fn root() -> Self {
        NodeId(ROOT_NODE_KEY.to_string())
    }

    /// Returns `true` for the reserved `_root` identifier.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_NODE_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a fresh 10-character alphanumeric identifier.
    pub fn random() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_ID_LEN)
            .map(char::from)
            .collect();
        NodeId(id)
    }

    /// Prefixes this id with `scope`, e.g. `portal.question`.
    ///
    /// Used to re-home nodes imported from another graph under a splice
    /// point without colliding with native identifiers.
    pub fn scoped(&self, scope: &NodeId, separator: &str) -> NodeId {
        NodeId(format!("{}{}{}", scope.0, separator, self.0))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_reserved_key() {
        assert!(NodeId::root().is_root());
        assert_eq!(NodeId::root().as_str(), "_root");
        assert!(!NodeId::from("root").is_root());
    }

    #[test]
    fn random_ids_are_alphanumeric() {
        let id = NodeId::random();
        assert_eq!(id.as_str().len(), GENERATED_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(NodeId::random(), NodeId::random());
    }

    #[test]
    fn scoped_prefixes_with_separator() {
        let id = NodeId::from("question");
        assert_eq!(id.scoped(&NodeId::from("portal"), "."), "portal.question");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&NodeId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, "abc");
    }
}
