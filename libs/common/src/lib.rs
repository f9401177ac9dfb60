//! Common library for the Interpals client
//!
//! This crate provides the ambient pieces shared by the client crates:
//! the error taxonomy, configuration loaded from the environment, and the
//! Redis connection used to persist sessions.

pub mod cache;
pub mod config;
pub mod error;

pub use error::{InterpalsError, InterpalsResult};
