//! CLI command implementations.

pub mod classify;
pub mod config;
pub mod query;
pub mod rewrite;
pub mod tables;
pub mod version;
