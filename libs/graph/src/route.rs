//! Route Tables
//!
//! Named, directed edges from one node to others. The node kind decides how
//! many routes may be registered; names are unique per node while the same
//! destination (including the node itself) may appear under several names.

use crate::error::{GraphError, Result};
use actor_runtime::Address;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Any number of uniquely named routes
    Unrestricted,
    /// At most one route
    Single,
    /// Terminal node, no routes at all
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    node: String,
    policy: RoutePolicy,
    routes: BTreeMap<String, Address>,
}

impl RouteTable {
    pub fn new(node: impl Into<String>, policy: RoutePolicy) -> Self {
        Self {
            node: node.into(),
            policy,
            routes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, route: &str, destination: Address) -> Result<()> {
        if route.trim().is_empty() {
            return Err(GraphError::routing_invalid(&self.node, "route name cannot be empty"));
        }
        match self.policy {
            RoutePolicy::Forbidden => {
                return Err(GraphError::routing_invalid(&self.node, "node accepts no routes"))
            }
            RoutePolicy::Single if !self.routes.is_empty() => {
                return Err(GraphError::routing_invalid(
                    &self.node,
                    "node accepts at most one route",
                ))
            }
            _ => {}
        }
        if self.routes.contains_key(route) {
            return Err(GraphError::routing_invalid(
                &self.node,
                format!("route '{}' already registered", route),
            ));
        }
        self.routes.insert(route.to_string(), destination);
        Ok(())
    }

    pub fn get(&self, route: &str) -> Result<&Address> {
        self.routes.get(route).ok_or_else(|| GraphError::UnknownRoute {
            node: self.node.clone(),
            route: route.to_string(),
        })
    }

    /// The one outgoing route of a pass-through node
    pub fn single(&self) -> Result<(&str, &Address)> {
        let mut iter = self.routes.iter();
        match (iter.next(), iter.next()) {
            (Some((name, destination)), None) => Ok((name.as_str(), destination)),
            _ => Err(GraphError::AmbiguousRoute {
                node: self.node.clone(),
                count: self.routes.len(),
            }),
        }
    }

    /// All routes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Address)> {
        self.routes.iter().map(|(name, address)| (name.as_str(), address))
    }

    pub fn policy(&self) -> RoutePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
