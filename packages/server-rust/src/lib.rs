//! Relay server: the action gateway, broker plumbing, and log RPC service.
//!
//! - [`dispatch`] classifies actions and routes them through a tower pipeline.
//! - [`transport`] holds the HTTP, RPC, and broker adapters.
//! - [`broker`] manages the broker connection, publishing, and topic consumption.
//! - [`rpc`] is the framed MessagePack client and server.
//! - [`network`] is the gateway's HTTP surface and process lifecycle.

pub mod broker;
pub mod cli;
pub mod dispatch;
pub mod network;
pub mod rpc;
pub mod sink;
pub mod telemetry;
pub mod transport;

pub use dispatch::{Dispatcher, DispatchRouter};
pub use network::NetworkModule;

#[cfg(test)]
mod test_support;
