//! Common types shared by the signature, container and identification modules.
//!
//! This module provides the unified error type, the request abstraction the
//! engine reads bytes through, and the scan budget applied while matching.

// Submodule declarations
pub mod budget;
pub mod error;
pub mod request;

// Re-exports for convenience
pub use budget::ScanBudget;
pub use error::{Error, Result};
pub use request::{FileRequest, IdentificationRequest, MemoryRequest, RequestMetaData, extension_of};
