//! Net module - wire protocol, host session, and peer client.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{Client, Notice};
pub use protocol::{Message, Payload, PlayerEntry, StateUpdate, DEFAULT_PORT};
pub use server::{run_host, HostConfig};
