//! Actor Runtime Error Types
//!
//! Structural failures (address, child and configuration validation) are
//! returned to the caller that attempted the operation. Processing failures are
//! recovered by the consumption loop and only surface through logging and the
//! optional failure hook.

use crate::address::Address;
use thiserror::Error;

/// Main runtime error type
#[derive(Error, Debug)]
pub enum ActorError {
    /// Malformed address or unsupported scheme
    #[error("Invalid address '{address}': {reason}")]
    AddressInvalid { address: String, reason: String },

    /// Operation attempted outside the Running state
    #[error("Actor {address} is not running")]
    ActorNotRunning { address: Address },

    /// Child address violates the parent namespace
    #[error("Address {child} is not a direct child of {parent}")]
    ChildAddressInvalid { parent: Address, child: Address },

    /// Child registered twice, or already attached to another parent
    #[error("Child {address} is already registered")]
    ChildAlreadyRegistered { address: Address },

    /// Crop of an address that is not a registered child
    #[error("Child {address} not found under {parent}")]
    ChildNotFound { parent: Address, address: Address },

    /// Stop requested on a child directly instead of through its parent
    #[error("Actor {address} is supervised by {parent}; crop it from the parent instead")]
    SupervisedChild { address: Address, parent: Address },

    /// Bounded mailbox full under the fail-fast policy
    #[error("Mailbox of {address} is full (capacity {capacity})")]
    MailboxFull { address: Address, capacity: usize },

    /// The user processing function returned an error
    #[error("Processing failed in {address}: {source}")]
    ProcessingFailure {
        address: Address,
        #[source]
        source: anyhow::Error,
    },

    /// Address book already holds an endpoint for this address
    #[error("Address {address} is already registered")]
    AddressAlreadyRegistered { address: Address },

    /// Address book has no endpoint for this address
    #[error("No endpoint registered for {address}")]
    UnknownAddress { address: Address },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    /// Create an address error
    pub fn address_invalid(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AddressInvalid {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-running error
    pub fn not_running(address: &Address) -> Self {
        Self::ActorNotRunning {
            address: address.clone(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Wrap a processing function failure
    pub fn processing(address: &Address, source: anyhow::Error) -> Self {
        Self::ProcessingFailure {
            address: address.clone(),
            source,
        }
    }

    /// True if this error is the not-running condition
    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::ActorNotRunning { .. })
    }

    /// Get error category for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::AddressInvalid { .. } => "address",
            Self::ActorNotRunning { .. } => "lifecycle",
            Self::ChildAddressInvalid { .. }
            | Self::ChildAlreadyRegistered { .. }
            | Self::ChildNotFound { .. }
            | Self::SupervisedChild { .. } => "supervision",
            Self::MailboxFull { .. } => "backpressure",
            Self::ProcessingFailure { .. } => "processing",
            Self::AddressAlreadyRegistered { .. } | Self::UnknownAddress { .. } => "resolver",
            Self::Configuration { .. } => "configuration",
        }
    }
}
