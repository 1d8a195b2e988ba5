//! LXD client and data models.
//!
//! Provides the [`LxdClient`] facade and typed access to instances and operations on top of
//! the [`lxd_core`] transport.

#![deny(missing_docs)]

pub mod client;
pub mod instances;
pub mod models;

pub use client::{LxdClient, LxdClientBuilder};
pub use instances::InstanceGroup;
pub use models::{Instance, InstanceCreateRequest, InstanceSource, Operation};

/// Convenient result alias that reuses the shared LXD error type.
pub type Result<T> = lxd_core::Result<T>;
