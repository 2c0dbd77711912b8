//! Shared types, errors, and configuration for Uplink.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for upload sessions
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ServerConfig, TransferConfig, UploadConfig};
pub use error::{AppError, AppResult};
