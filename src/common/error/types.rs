//! Unified error types for the identification engine.
//!
//! Load-time failures (missing or malformed signature documents), request-time
//! failures (resource I/O, unknown container families) and configuration errors
//! all surface through the single [`Error`] enum so front ends can report them
//! uniformly.
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for identification operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while reading a resource or a definition document
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Signature or container definition source does not exist or cannot be opened
    #[error("Signature file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Signature or container definition document is structurally invalid
    #[error("Invalid signature file: {0}")]
    InvalidSignatureFile(String),

    /// XML parsing error
    #[error("XML error: {0}")]
    XmlError(String),

    /// The engine was used before a signature file was loaded
    #[error("Identification engine has not been initialised with a signature file")]
    NotInitialized,

    /// A trigger puid resolved to a container family with no registered identifier
    #[error("No container identifier registered for container family '{0}'")]
    UnknownContainerFamily(String),

    /// Byte access on a request that has already been closed
    #[error("Resource has been closed: {0}")]
    ResourceClosed(String),

    /// Byte access past the end of a resource
    #[error("Byte index {index} is out of bounds for resource of {size} bytes")]
    OutOfBounds { index: u64, size: u64 },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for identification operations.
pub type Result<T> = std::result::Result<T, Error>;
