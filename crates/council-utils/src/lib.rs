//! Shared utilities for council-rs
//!
//! This crate provides common functionality used across the council-rs
//! workspace: tracing subscriber setup and typed environment-variable lookup.

pub mod config;
pub mod logging;

pub use config::{EnvError, env_or, env_parse, env_string};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
