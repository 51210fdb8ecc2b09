//! JSON-RPC 2.0 tool-calling over HTTP.
//!
//! The crate ships three pieces that share one wire model ([`protocol`]):
//!
//! - a **gateway** ([`server`], [`handlers`], [`registry`], [`weather`]) that
//!   advertises tools via `tools/list` and runs them via `tools/call`;
//! - an **agent** ([`agent`], [`client`]) that discovers the gateway's tools,
//!   lets a chat model decide when to call them, and keeps per-session history;
//! - a **compliance client** ([`compliance`]) that probes a gateway's error
//!   tiers from the outside.

pub mod agent;
pub mod client;
pub mod compliance;
pub mod config;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
pub mod weather;
