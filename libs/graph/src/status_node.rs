//! Status Node
//!
//! Terminal responder holding one typed value. `Request` replies with the
//! current value; `Update` replaces it wholesale.

use crate::error::{GraphError, Result};
use crate::node::Node;
use actor_runtime::{
    Actor, ActorContext, ActorOptions, ActorState, ActorStatus, Address, AddressBook,
    DeliveryOutcome, Message, Processor,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Status protocol
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage<T> {
    Request { sender: Address },
    Response { sender: Address, value: T },
    /// Replace the stored value
    Update { sender: Address, value: T },
}

impl<T> StatusMessage<T> {
    fn kind(&self) -> &'static str {
        match self {
            StatusMessage::Request { .. } => "status request",
            StatusMessage::Response { .. } => "status response",
            StatusMessage::Update { .. } => "status update",
        }
    }
}

impl<T: Send + 'static> Message for StatusMessage<T> {
    fn sender(&self) -> &Address {
        match self {
            StatusMessage::Request { sender }
            | StatusMessage::Response { sender, .. }
            | StatusMessage::Update { sender, .. } => sender,
        }
    }

    /// Requests are probes; responses and updates carry a value to keep
    fn mutation(&self) -> bool {
        !matches!(self, StatusMessage::Request { .. })
    }
}

struct StatusProcessor<T: ActorState> {
    name: String,
    book: Arc<AddressBook<StatusMessage<T>>>,
}

#[async_trait]
impl<T: ActorState> Processor<T, StatusMessage<T>> for StatusProcessor<T> {
    async fn process(
        &self,
        message: StatusMessage<T>,
        ctx: &ActorContext<'_, T, StatusMessage<T>>,
    ) -> anyhow::Result<T> {
        match message {
            StatusMessage::Request { sender } => {
                debug!(node = %self.name, requester = %sender, "Status request");
                let reply = StatusMessage::Response {
                    sender: ctx.address().clone(),
                    value: ctx.state().clone(),
                };
                self.book.deliver(&sender, reply).await?;
                Ok(ctx.state().clone())
            }
            StatusMessage::Update { sender, value } => {
                debug!(node = %self.name, updater = %sender, "Status update");
                Ok(value)
            }
            other @ StatusMessage::Response { .. } => Err(GraphError::UnexpectedMessage {
                node: self.name.clone(),
                kind: other.kind(),
            }
            .into()),
        }
    }
}

/// Handle to a Status node
pub struct StatusNode<T: ActorState> {
    name: String,
    actor: Actor<T, StatusMessage<T>>,
}

impl<T: ActorState> StatusNode<T> {
    pub(crate) fn spawn(
        name: &str,
        address: Address,
        initial: T,
        options: ActorOptions<StatusMessage<T>>,
    ) -> Result<Self> {
        let book = options.address_book.clone().ok_or_else(|| {
            GraphError::routing_invalid(name, "status node requires an address book")
        })?;
        let processor = StatusProcessor {
            name: name.to_string(),
            book,
        };
        let actor = Actor::new(address, processor, initial, options)?;
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

    /// Last committed value
    pub fn value(&self) -> T {
        self.actor.state()
    }

    pub async fn deliver(&self, message: StatusMessage<T>) -> Result<DeliveryOutcome> {
        Ok(self.actor.deliver(message).await?)
    }

    /// Status nodes are terminal responders and accept no routes
    pub fn one_way_route(&self, route: &str, destination: &Node) -> Result<()> {
        Err(GraphError::routing_invalid(
            &self.name,
            format!(
                "status node accepts no routes (attempted '{}' to {})",
                route,
                destination.name()
            ),
        ))
    }

    pub(crate) fn actor(&self) -> &Actor<T, StatusMessage<T>> {
        &self.actor
    }
}

impl<T: ActorState> Clone for StatusNode<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            actor: self.actor.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_flags() {
        let sender: Address = "actor://localhost/probe".parse().unwrap();
        assert!(!StatusMessage::<u8>::Request { sender: sender.clone() }.mutation());
        assert!(StatusMessage::Update { sender: sender.clone(), value: 1u8 }.mutation());
        assert!(StatusMessage::Response { sender, value: 1u8 }.mutation());
    }
}
