//! Unified error types for the identification engine.
//!
//! This module provides a single error type covering signature loading,
//! resource access and container escalation failures.

// Submodule declarations
pub mod types;
pub mod conversions;

// Re-exports
pub use types::{Error, Result};
