//! gRPC API handlers for the ManagerService.
//!
//! This module contains the implementation of the ManagerService gRPC service
//! as defined in `proto/nodemgr/v1/manager.proto`.

pub mod manager_service;

pub use manager_service::NodeManagerService;
