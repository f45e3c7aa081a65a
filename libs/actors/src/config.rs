//! Runtime Configuration
//!
//! Mailbox sizing, backpressure policy and drain grace period, loadable from
//! TOML:
//!
//! ```toml
//! host = "localhost"
//! drain_grace_ms = 5000
//!
//! [mailbox]
//! capacity = 1024
//! policy = "drop_oldest"   # block, fail_fast, unbounded, drop_newest, drop_oldest
//! ```

use crate::error::{ActorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;
pub const DEFAULT_DRAIN_GRACE_MS: u64 = 5000;

/// Behavior of a full bounded mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Sender suspends until space exists
    #[default]
    Block,
    /// Delivery fails with a capacity error, message dropped
    FailFast,
    /// Always enqueue; capacity is ignored
    Unbounded,
    /// Incoming message silently discarded, success reported
    DropNewest,
    /// Oldest queued message evicted to make room
    DropOldest,
}

/// Mailbox sizing and policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct MailboxConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub policy: BackpressurePolicy,
}

impl MailboxConfig {
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        Self { capacity, policy }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 && self.policy != BackpressurePolicy::Unbounded {
            return Err(ActorError::configuration(
                "Mailbox capacity must be greater than zero",
                Some("mailbox.capacity"),
            ));
        }
        Ok(())
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MAILBOX_CAPACITY,
            policy: BackpressurePolicy::Block,
        }
    }
}

/// Runtime-wide defaults
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Host component of generated addresses
    #[serde(default = "default_host")]
    pub host: String,
    /// Upper bound of the post-cancellation drain phase
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
    #[serde(default)]
    pub mailbox: MailboxConfig,
}

impl RuntimeConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ActorError::configuration(format!("Failed to read config file: {}", e), None)
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| {
            ActorError::configuration(format!("Failed to parse config: {}", e), None)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ActorError::configuration("Host cannot be empty", Some("host")));
        }
        self.mailbox.validate()
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            drain_grace_ms: DEFAULT_DRAIN_GRACE_MS,
            mailbox: MailboxConfig::default(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

fn default_drain_grace_ms() -> u64 {
    DEFAULT_DRAIN_GRACE_MS
}
