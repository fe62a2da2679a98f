//! # principia_core
//!
//! Login orchestration for Principia: a credential authenticator, a namespaced
//! session store, a TTL-bound session manager and the login use case that ties
//! them together. Every collaborator is passed in explicitly.

pub mod auth;
pub mod clock;
pub mod config;
pub mod login;
pub mod models;
pub mod session;
pub mod storage;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
