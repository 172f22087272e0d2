//! `herald-core`: configuration, shared error type, and the platform model
//! used by every other herald crate.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
pub use types::{Platform, PlatformFamily};
