//! Node manager core - control-plane server and operator console.
//!
//! This crate provides:
//! - the gRPC `ManagerService` handlers backed by a [`nodemgr_node::NodeRpc`] client
//! - the unix-socket lifecycle coordinator with graceful shutdown
//! - the console: command registry, reply dispatcher, one-shot and interactive front-ends

pub mod api;
pub mod cli;
pub mod client;
pub mod console;
pub mod error;
pub mod server;
pub mod shutdown;
