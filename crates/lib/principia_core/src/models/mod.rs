//! Domain models shared by the login subsystem.

pub mod auth;
pub mod session;
