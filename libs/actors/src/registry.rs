//! Address Book
//!
//! Maps addresses to deliverable endpoints for one message protocol. Actors
//! built with a book register themselves on construction and unregister when
//! they reach Idle. Schema + path-prefix queries support dynamic discovery.

use crate::address::{Address, Scheme};
use crate::error::{ActorError, Result};
use crate::mailbox::DeliveryOutcome;
use crate::messages::Message;
use crate::supervision::{ActorStatus, Addressable};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Something that accepts messages of protocol `M`
#[async_trait]
pub trait Endpoint<M: Message>: Addressable {
    async fn deliver(&self, msg: M) -> Result<DeliveryOutcome>;
}

/// Resolver from addresses to endpoints
pub struct AddressBook<M: Message> {
    endpoints: DashMap<Address, Arc<dyn Endpoint<M>>>,
}

impl<M: Message> AddressBook<M> {
    pub fn new() -> Self {
        Self {
            endpoints: DashMap::new(),
        }
    }

    /// Register an endpoint; an Idle endpoint under the same address is replaced
    pub fn register(&self, endpoint: Arc<dyn Endpoint<M>>) -> Result<()> {
        let address = endpoint.address().clone();
        match self.endpoints.entry(address.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().status() != ActorStatus::Idle {
                    warn!(actor = %address, "Address already registered");
                    return Err(ActorError::AddressAlreadyRegistered { address });
                }
                existing.insert(endpoint);
            }
            Entry::Vacant(slot) => {
                slot.insert(endpoint);
            }
        }
        debug!(actor = %address, "Registered endpoint");
        Ok(())
    }

    pub fn unregister(&self, address: &Address) -> Option<Arc<dyn Endpoint<M>>> {
        let removed = self.endpoints.remove(address).map(|(_, endpoint)| endpoint);
        if removed.is_some() {
            debug!(actor = %address, "Unregistered endpoint");
        }
        removed
    }

    /// Remove the entry only if it is Idle, so a successor is left in place
    pub(crate) fn unregister_idle(&self, address: &Address) {
        if self
            .endpoints
            .remove_if(address, |_, endpoint| endpoint.status() == ActorStatus::Idle)
            .is_some()
        {
            debug!(actor = %address, "Unregistered stopped endpoint");
        }
    }

    pub fn lookup(&self, address: &Address) -> Result<Arc<dyn Endpoint<M>>> {
        self.endpoints
            .get(address)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ActorError::UnknownAddress {
                address: address.clone(),
            })
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.endpoints.contains_key(address)
    }

    /// Resolve and deliver in one step
    pub async fn deliver(&self, address: &Address, msg: M) -> Result<DeliveryOutcome> {
        let endpoint = self.lookup(address)?;
        endpoint.deliver(msg).await
    }

    /// Addresses in `scheme` whose path starts with `path_prefix`
    /// (`"/flow/nodes"`, `"flow"` and `""` are all accepted), sorted
    pub fn query(&self, scheme: Scheme, path_prefix: &str) -> Vec<Address> {
        let prefix: Vec<&str> = path_prefix.split('/').filter(|s| !s.is_empty()).collect();

        let mut found: Vec<Address> = self
            .endpoints
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|address| {
                address.scheme() == scheme
                    && address.path().len() >= prefix.len()
                    && address
                        .path()
                        .iter()
                        .zip(prefix.iter())
                        .all(|(segment, wanted)| segment == wanted)
            })
            .collect();
        found.sort();
        found
    }

    pub fn addresses(&self) -> Vec<Address> {
        let mut all: Vec<Address> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl<M: Message> Default for AddressBook<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> fmt::Debug for AddressBook<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressBook")
            .field("endpoints", &self.addresses())
            .finish()
    }
}
