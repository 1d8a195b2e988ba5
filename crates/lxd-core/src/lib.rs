//! # lxd-core
//!
//! Transport and dispatch layer for the LXD REST API.
//!
//! This crate composes endpoint paths, executes requests, classifies the daemon's response
//! envelope and models objects that are fetched lazily.
//!
//! ## Modules
//!
//! - [`path`] - Immutable API paths rooted at `<origin>/1.0`
//! - [`query`] - Query parameter builder with merge semantics
//! - [`response`] - Envelope classification and status codes
//! - [`client`] - HTTP backend capability and its reqwest implementation
//! - [`transport`] - Request execution
//! - [`entity`] - Lazily fetched entities
//! - [`config`] - Client configuration
//! - [`error`] - Error types

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod path;
pub mod query;
pub mod response;
pub mod transport;

// Re-export commonly used types
pub use client::{HttpBackend, RawResponse, ReqwestBackend};
pub use config::LxdConfig;
pub use entity::{Entity, EntityState, LazyEntity};
pub use error::{Error, Result};
pub use path::ApiPath;
pub use query::QueryParams;
pub use response::{AsyncResponse, ErrorResponse, Metadata, Response, StatusCode, SyncResponse};
pub use transport::Transport;
pub use reqwest::Method;
