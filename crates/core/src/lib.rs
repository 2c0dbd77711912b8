//! Core upload logic for Uplink.
//!
//! This crate contains the upload pipeline with ZERO HTTP-client dependencies.
//! Network I/O goes through the [`upload::Transport`] trait, implemented by
//! `uplink-client`.
//!
//! # Modules
//!
//! - `upload` - Session state machine, the four upload phases and their orchestration

pub mod upload;
