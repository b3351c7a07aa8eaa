//! # pmbridge Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the core infrastructure components shared by every
//! command: configuration loading and error types.
//!
//! ## Architecture
//!
//! - `config`: Configuration loading, layering, path expansion and validation
//! - `error`: Error types and the crate-wide `Result` alias
//!
//! ## Usage
//!
//! ```rust
//! use crate::core::config; // For loading configuration
//! use crate::core::error::{PmError, Result}; // For error handling
//! ```
//!
pub mod config;
pub mod error;
