//! Room-scoped WebSocket chat fan-out over a Redis pub/sub bus.
//!
//! Clients connect to `/ws/room/{room}` and exchange JSON chat messages.
//! Every inbound message is validated and published to Redis; one
//! background subscriber per process forwards deliveries back to the
//! locally connected sockets of the matching room, so fan-out behaves
//! identically whether one or many server processes are running.

pub mod config;
pub mod server;

// shared library
pub mod common;
