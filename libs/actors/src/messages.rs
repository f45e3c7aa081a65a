//! Actor Messages
//!
//! Every message exposes who sent it and whether its processing result may
//! replace the receiving actor's state. The mutation flag is authoritative: a
//! non-mutating message passes through a transient actor without changing its
//! state, whatever the processing function computes.
//!
//! Subsystems define their own closed message enums and implement [`Message`]
//! for them; [`Envelope`] is the generic carrier for raw actor usage.

use crate::address::Address;

/// Capability set shared by every message type
pub trait Message: Send + 'static {
    /// Address of the sending actor or caller
    fn sender(&self) -> &Address;

    /// Whether the processing result may be committed as the new state
    fn mutation(&self) -> bool;
}

/// Generic message carrying an arbitrary payload
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<P> {
    sender: Address,
    payload: P,
    mutation: bool,
}

impl<P> Envelope<P> {
    pub fn new(sender: Address, payload: P, mutation: bool) -> Self {
        Self {
            sender,
            payload,
            mutation,
        }
    }

    /// Message whose result is committed as the new state
    pub fn mutating(sender: Address, payload: P) -> Self {
        Self::new(sender, payload, true)
    }

    /// Message whose result is discarded by transient actors
    pub fn read_only(sender: Address, payload: P) -> Self {
        Self::new(sender, payload, false)
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P: Send + 'static> Message for Envelope<P> {
    fn sender(&self) -> &Address {
        &self.sender
    }

    fn mutation(&self) -> bool {
        self.mutation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_flags() {
        let sender: Address = "actor://local/caller".parse().unwrap();

        let write = Envelope::mutating(sender.clone(), 7u32);
        assert!(write.mutation());
        assert_eq!(write.sender(), &sender);
        assert_eq!(*write.payload(), 7);

        let read = Envelope::read_only(sender, "probe");
        assert!(!read.mutation());
        assert_eq!(read.into_payload(), "probe");
    }
}
