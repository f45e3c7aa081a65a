//! Actor Addresses
//!
//! Hierarchical `scheme://host/path/...` identifiers. An address is both the
//! identity of an actor and the namespace its children live in: a child shares
//! scheme and host with its parent and extends the parent's path by exactly one
//! segment.

use crate::error::{ActorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const SCHEME_SEPARATOR: &str = "://";

/// Address namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Raw actors
    Actor,
    /// Graph engine nodes and supervisors
    Graph,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Actor => "actor",
            Scheme::Graph => "graph",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = ActorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "actor" => Ok(Scheme::Actor),
            "graph" => Ok(Scheme::Graph),
            other => Err(ActorError::address_invalid(
                other,
                "unsupported scheme (expected actor or graph)",
            )),
        }
    }
}

/// Immutable hierarchical address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    scheme: Scheme,
    host: String,
    path: Vec<String>,
}

impl Address {
    /// Build an address from its parts, validating every segment
    pub fn new<I, P>(scheme: Scheme, host: impl Into<String>, path: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let host = host.into();
        validate_segment(&host).map_err(|reason| {
            ActorError::address_invalid(format!("{}{}{}", scheme, SCHEME_SEPARATOR, host), reason)
        })?;

        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        for segment in &path {
            validate_segment(segment).map_err(|reason| {
                ActorError::address_invalid(
                    format!("{}{}{}/{}", scheme, SCHEME_SEPARATOR, host, path.join("/")),
                    reason,
                )
            })?;
        }

        Ok(Self { scheme, host, path })
    }

    /// Root address of a host (empty path)
    pub fn root(scheme: Scheme, host: impl Into<String>) -> Result<Self> {
        Self::new(scheme, host, Vec::<String>::new())
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Last path segment, if any
    pub fn name(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// Address one segment deeper than this one
    pub fn child(&self, segment: &str) -> Result<Self> {
        validate_segment(segment)
            .map_err(|reason| ActorError::address_invalid(format!("{}/{}", self, segment), reason))?;

        let mut path = self.path.clone();
        path.push(segment.to_string());
        Ok(Self {
            scheme: self.scheme,
            host: self.host.clone(),
            path,
        })
    }

    /// Child address with a fresh, collision-free segment
    pub fn unique_child(&self) -> Self {
        let mut path = self.path.clone();
        path.push(Uuid::new_v4().simple().to_string());
        Self {
            scheme: self.scheme,
            host: self.host.clone(),
            path,
        }
    }

    /// Address one segment shallower, None for a host root
    pub fn parent(&self) -> Option<Self> {
        let (_, prefix) = self.path.split_last()?;
        Some(Self {
            scheme: self.scheme,
            host: self.host.clone(),
            path: prefix.to_vec(),
        })
    }

    /// True if `child` is exactly one segment below this address
    pub fn is_parent_of(&self, child: &Address) -> bool {
        self.scheme == child.scheme
            && self.host == child.host
            && child.path.len() == self.path.len() + 1
            && child.path.starts_with(&self.path)
    }

    /// True if this address lives at or below `prefix`
    pub fn starts_with(&self, prefix: &Address) -> bool {
        self.scheme == prefix.scheme
            && self.host == prefix.host
            && self.path.starts_with(&prefix.path)
    }
}

fn validate_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if segment.contains('/') {
        return Err("segment contains '/'");
    }
    if segment.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("segment contains whitespace");
    }
    Ok(())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, SCHEME_SEPARATOR, self.host)?;
        for segment in &self.path {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = ActorError;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| ActorError::address_invalid(s, "missing '://' separator"))?;
        let scheme: Scheme = scheme
            .parse()
            .map_err(|_| ActorError::address_invalid(s, "unsupported scheme (expected actor or graph)"))?;

        // A single trailing slash is tolerated, empty inner segments are not
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let mut parts = rest.split('/');
        let host = parts.next().unwrap_or_default();
        let path: Vec<&str> = parts.collect();

        Address::new(scheme, host, path).map_err(|e| match e {
            ActorError::AddressInvalid { reason, .. } => ActorError::address_invalid(s, reason),
            other => other,
        })
    }
}

impl TryFrom<String> for Address {
    type Error = ActorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_and_display() {
        let address: Address = "actor://local/a/b".parse().unwrap();
        assert_eq!(address.scheme(), Scheme::Actor);
        assert_eq!(address.host(), "local");
        assert_eq!(address.path(), &["a".to_string(), "b".to_string()]);
        assert_eq!(address.to_string(), "actor://local/a/b");
        assert_eq!(address.name(), Some("b"));

        let root: Address = "graph://local".parse().unwrap();
        assert!(root.path().is_empty());
        assert_eq!(root.to_string(), "graph://local");

        let trailing: Address = "actor://local/a/".parse().unwrap();
        assert_eq!(trailing.to_string(), "actor://local/a");
    }

    #[test]
    fn test_malformed_addresses() {
        for bad in [
            "local/a",
            "http://local/a",
            "actor://",
            "actor:///a",
            "actor://local//a",
            "actor://lo cal/a",
        ] {
            let err = bad.parse::<Address>().unwrap_err();
            assert!(
                matches!(err, ActorError::AddressInvalid { .. }),
                "{} should be invalid",
                bad
            );
        }
    }

    #[test]
    fn test_parent_child_relation() {
        let parent: Address = "actor://host/a".parse().unwrap();
        let child = parent.child("worker").unwrap();
        assert_eq!(child.to_string(), "actor://host/a/worker");
        assert!(parent.is_parent_of(&child));
        assert_eq!(child.parent(), Some(parent.clone()));

        let grandchild = child.child("x").unwrap();
        assert!(!parent.is_parent_of(&grandchild));
        assert!(grandchild.starts_with(&parent));

        let other_host: Address = "actor://otherhost/a/worker".parse().unwrap();
        let sibling: Address = "actor://host/b".parse().unwrap();
        let other_scheme: Address = "graph://host/a/worker".parse().unwrap();
        assert!(!parent.is_parent_of(&other_host));
        assert!(!parent.is_parent_of(&sibling));
        assert!(!parent.is_parent_of(&other_scheme));
        assert!(!parent.is_parent_of(&parent));

        assert!(parent.child("a/b").is_err());
        assert!(parent.child("").is_err());
    }

    #[test]
    fn test_unique_children_do_not_collide() {
        let parent: Address = "actor://host/a".parse().unwrap();
        let first = parent.unique_child();
        let second = parent.unique_child();
        assert_ne!(first, second);
        assert!(parent.is_parent_of(&first));
        assert!(parent.is_parent_of(&second));
    }

    #[test]
    fn test_serde_uses_string_form() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Wrapper {
            address: Address,
        }

        let wrapper = Wrapper {
            address: "graph://local/flow/root".parse().unwrap(),
        };
        let encoded = toml::to_string(&wrapper).unwrap();
        assert_eq!(encoded.trim(), r#"address = "graph://local/flow/root""#);

        let decoded: Wrapper = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded, wrapper);

        let rejected = toml::from_str::<Wrapper>(r#"address = "ftp://local""#);
        assert!(rejected.is_err());
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(
            host in "[a-z][a-z0-9.-]{0,12}",
            path in proptest::collection::vec("[a-zA-Z0-9_-]{1,8}", 0..5),
        ) {
            let address = Address::new(Scheme::Actor, host, path).unwrap();
            let parsed: Address = address.to_string().parse().unwrap();
            prop_assert_eq!(parsed, address);
        }

        #[test]
        fn prop_unique_child_extends_parent_by_one(
            path in proptest::collection::vec("[a-z]{1,6}", 0..4),
        ) {
            let parent = Address::new(Scheme::Actor, "host", path).unwrap();
            let child = parent.unique_child();
            prop_assert!(parent.is_parent_of(&child));
            prop_assert_eq!(child.path().len(), parent.path().len() + 1);
            prop_assert_eq!(child.parent().unwrap(), parent);
        }
    }
}
