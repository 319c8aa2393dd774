pub mod auth;
pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod project;
pub mod selection;
pub mod workspace;

// Re-export common error type
pub use error::{BuildsyncError, Result};
