//! LAN Tetris - deterministic falling-block engine with host-authoritative
//! multiplayer over TCP.
//!
//! `core` is pure game logic; `net` layers the wire protocol, host session,
//! and peer client on top of it. The binary in `main.rs` exposes single,
//! host, and join modes.

pub mod core;
pub mod net;
pub mod types;
