//! Common Test Utilities for the Actor Runtime
//!
//! Shared actor fixtures and polling helpers for integration suites.

#![allow(dead_code)]

use actor_runtime::{from_fn, Actor, ActorContext, ActorOptions, Address, Envelope, Processor};
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub type Msg = Envelope<i64>;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring RUST_LOG
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

pub fn client() -> Address {
    addr("actor://localhost/client")
}

/// Processing function adding the payload to the state
pub fn adding() -> impl Processor<i64, Msg> {
    from_fn(|msg: Msg, ctx: &ActorContext<'_, i64, Msg>| Ok(ctx.state() + msg.payload()))
}

pub fn adder(address: &str, options: ActorOptions<Msg>) -> Actor<i64, Msg> {
    Actor::new(addr(address), adding(), 0, options).unwrap()
}

/// Poll until `check` holds or fail after two seconds
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 2s");
}
