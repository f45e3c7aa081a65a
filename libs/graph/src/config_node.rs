//! Config Node
//!
//! Terminal responder serving a key/value snapshot of the graph configuration.
//! The snapshot is the configuration serialized to a JSON object once, at node
//! construction. Replies go to the requester's address through the address
//! book the node was built with.

use crate::error::{GraphError, Result};
use crate::node::Node;
use crate::state::GraphConfig;
use actor_runtime::{
    Actor, ActorContext, ActorOptions, ActorStatus, Address, AddressBook, DeliveryOutcome, Message,
    Processor,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Config protocol
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigMessage {
    /// Enumerate configuration keys
    KeysRequest { sender: Address },
    /// Enumerate all key/value entries
    EntriesRequest { sender: Address },
    /// Fetch specific keys; unknown keys are omitted from the reply
    ValueRequest { sender: Address, keys: Vec<String> },
    Response {
        sender: Address,
        payload: ConfigPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigPayload {
    Keys(Vec<String>),
    Entries(BTreeMap<String, Value>),
}

impl ConfigMessage {
    fn kind(&self) -> &'static str {
        match self {
            ConfigMessage::KeysRequest { .. } => "keys request",
            ConfigMessage::EntriesRequest { .. } => "entries request",
            ConfigMessage::ValueRequest { .. } => "value request",
            ConfigMessage::Response { .. } => "config response",
        }
    }
}

impl Message for ConfigMessage {
    fn sender(&self) -> &Address {
        match self {
            ConfigMessage::KeysRequest { sender }
            | ConfigMessage::EntriesRequest { sender }
            | ConfigMessage::ValueRequest { sender, .. }
            | ConfigMessage::Response { sender, .. } => sender,
        }
    }

    /// Responses carry data for the requester to keep
    fn mutation(&self) -> bool {
        matches!(self, ConfigMessage::Response { .. })
    }
}

/// Serialize a configuration into its flat key/value snapshot
pub(crate) fn snapshot<C: GraphConfig>(config: &C) -> Result<BTreeMap<String, Value>> {
    match serde_json::to_value(config)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(GraphError::Serialization(serde::ser::Error::custom(format!(
            "configuration must serialize to an object, got {}",
            other
        )))),
    }
}

struct ConfigProcessor {
    name: String,
    entries: Arc<BTreeMap<String, Value>>,
    book: Arc<AddressBook<ConfigMessage>>,
}

impl ConfigProcessor {
    fn answer(&self, request: &ConfigMessage) -> Option<ConfigPayload> {
        match request {
            ConfigMessage::KeysRequest { .. } => {
                Some(ConfigPayload::Keys(self.entries.keys().cloned().collect()))
            }
            ConfigMessage::EntriesRequest { .. } => {
                Some(ConfigPayload::Entries(self.entries.as_ref().clone()))
            }
            ConfigMessage::ValueRequest { keys, .. } => Some(ConfigPayload::Entries(
                keys.iter()
                    .filter_map(|key| {
                        self.entries
                            .get(key)
                            .map(|value| (key.clone(), value.clone()))
                    })
                    .collect(),
            )),
            ConfigMessage::Response { .. } => None,
        }
    }
}

#[async_trait]
impl Processor<(), ConfigMessage> for ConfigProcessor {
    async fn process(
        &self,
        message: ConfigMessage,
        ctx: &ActorContext<'_, (), ConfigMessage>,
    ) -> anyhow::Result<()> {
        let payload = self.answer(&message).ok_or(GraphError::UnexpectedMessage {
            node: self.name.clone(),
            kind: message.kind(),
        })?;

        debug!(node = %self.name, request = message.kind(), requester = %message.sender(), "Config request");
        let reply = ConfigMessage::Response {
            sender: ctx.address().clone(),
            payload,
        };
        self.book.deliver(message.sender(), reply).await?;
        Ok(())
    }
}

/// Handle to a Config node
#[derive(Clone)]
pub struct ConfigNode {
    name: String,
    actor: Actor<(), ConfigMessage>,
}

impl ConfigNode {
    pub(crate) fn spawn(
        name: &str,
        address: Address,
        entries: BTreeMap<String, Value>,
        options: ActorOptions<ConfigMessage>,
    ) -> Result<Self> {
        let book = options.address_book.clone().ok_or_else(|| {
            GraphError::routing_invalid(name, "config node requires an address book")
        })?;
        let processor = ConfigProcessor {
            name: name.to_string(),
            entries: Arc::new(entries),
            book,
        };
        let actor = Actor::new(address, processor, (), options)?;
        Ok(Self {
            name: name.to_string(),
            actor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        self.actor.address()
    }

    pub fn status(&self) -> ActorStatus {
        self.actor.status()
    }

    pub async fn deliver(&self, message: ConfigMessage) -> Result<DeliveryOutcome> {
        Ok(self.actor.deliver(message).await?)
    }

    /// Config nodes are terminal responders and accept no routes
    pub fn one_way_route(&self, route: &str, destination: &Node) -> Result<()> {
        Err(GraphError::routing_invalid(
            &self.name,
            format!(
                "config node accepts no routes (attempted '{}' to {})",
                route,
                destination.name()
            ),
        ))
    }

    pub(crate) fn actor(&self) -> &Actor<(), ConfigMessage> {
        &self.actor
    }
}
