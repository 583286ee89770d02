// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Addressing for remote entities.
//!
//! An [`Identity`] names an entity by the application that owns it and a name local to that
//! application. A [`Topic`] adds the entity kind and is the key used both when subscribing to
//! remote events and when routing incoming raw events to local registries.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Pluggable identity rule, run after [`validate_identity`]. `None` (or an empty message) accepts.
pub type IdentityValidator = fn(&Identity) -> Option<String>;

/// Immutable address of a remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct Identity {
    /// Process / application grouping key
    #[serde(rename = "uuid")]
    #[validate(length(min = 1, message = "uuid must not be empty"))]
    owner_key: String,

    /// Frame or window name, local to the owner
    #[serde(rename = "name")]
    #[validate(length(min = 1, message = "name must not be empty"))]
    local_name: String,
}

impl Identity {
    pub fn new(owner_key: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            owner_key: owner_key.into(),
            local_name: local_name.into(),
        }
    }

    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_key, self.local_name)
    }
}

/// Default [`IdentityValidator`]: structural checks only.
pub fn validate_identity(identity: &Identity) -> Option<String> {
    let errors = identity.validate().err()?;
    let mut reasons: Vec<String> = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .map(|err| match &err.message {
            Some(message) => message.to_string(),
            None => err.code.to_string(),
        })
        .collect();
    reasons.sort();
    Some(reasons.join(", "))
}

/// Routing key for a remote entity: `[kind, owner_key, local_name]`.
///
/// Segments are shared, and the joined key is computed once so that equality and hashing
/// cost a single string comparison.
#[derive(Clone)]
pub struct Topic {
    segments: Arc<[String]>,
    key: Arc<str>,
}

impl Topic {
    pub fn new(kind: &str, identity: &Identity) -> Self {
        Self::from_segments(vec![
            kind.to_string(),
            identity.owner_key.clone(),
            identity.local_name.clone(),
        ])
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        let key: Arc<str> = Arc::from(segments.join("/"));
        Self {
            segments: Arc::from(segments),
            key,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Entity kind segment, empty for a topic without segments
    pub fn kind(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.key, &other.key) || self.key == other.key
    }
}

impl Eq for Topic {}

impl Hash for Topic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Topic").field(&self.segments).finish()
    }
}

impl Serialize for Topic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.segments.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<String>::deserialize(deserializer).map(Topic::from_segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn test_topic_from_identity() {
        let identity = Identity::new("app-uuid", "frame-1");
        let topic = Topic::new("frame", &identity);

        assert_eq!(topic.segments(), ["frame", "app-uuid", "frame-1"]);
        assert_eq!(topic.kind(), "frame");
        assert_eq!(topic.to_string(), "frame/app-uuid/frame-1");
    }

    #[test]
    fn test_equal_identities_produce_equal_topics() {
        let a = Topic::new("frame", &Identity::new("app", "main"));
        let b = Topic::new("frame", &Identity::new("app", "main"));
        let other_kind = Topic::new("window", &Identity::new("app", "main"));

        assert_eq!(a, b);
        assert_ne!(a, other_kind);

        let set: HashSet<Topic> = [a.clone(), b, other_kind].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[rstest]
    #[case("app", "main", None)]
    #[case("", "main", Some("uuid must not be empty"))]
    #[case("app", "", Some("name must not be empty"))]
    #[case("", "", Some("name must not be empty, uuid must not be empty"))]
    fn test_validate_identity(
        #[case] owner: &str,
        #[case] name: &str,
        #[case] expected: Option<&str>,
    ) {
        let identity = Identity::new(owner, name);
        assert_eq!(validate_identity(&identity).as_deref(), expected);
    }

    #[test]
    fn test_identity_wire_shape() {
        let identity = Identity::new("app", "main");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json, serde_json::json!({ "uuid": "app", "name": "main" }));

        let parsed: Identity = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, identity);
    }

    #[test]
    fn test_topic_serializes_as_segments() {
        let topic = Topic::new("window", &Identity::new("app", "main"));
        let json = serde_json::to_string(&topic).unwrap();
        assert_eq!(json, r#"["window","app","main"]"#);

        let parsed: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, topic);
    }
}
