//! Configuration for the render service
//!
//! This module provides the `RenderConfig` struct, its validating builder and
//! the environment loader used by the binary.

// Sub-modules
pub mod builder;
pub mod env;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::RenderConfigBuilder;
pub use types::{LogFormat, RenderConfig};
