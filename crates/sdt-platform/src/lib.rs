//! Simple Diet Tracker Platform
//!
//! Core of the tracker backend:
//! - Domain: accounts, intake records and verified claims
//! - Repository: SQLite persistence for accounts and records
//! - Client: identity service client
//! - Service: account resolution, auth orchestration, ownership-scoped records
//! - API: axum routers, bearer verification and OpenAPI documentation

pub mod api;
pub mod client;
pub mod context;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

pub use context::{CallContext, CancelHandle};
pub use domain::*;
pub use error::{Result, ServiceError};
