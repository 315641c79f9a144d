//! High-level API: identify files on disk from signature files.
//!
//! ```no_run
//! use pronto::api::Identifier;
//!
//! let identifier = Identifier::builder()
//!     .binary_signature("DROID_SignatureFile_V120.xml")
//!     .container_signature("container-signature-20240715.xml")
//!     .max_bytes_to_scan(65536)
//!     .build()?;
//!
//! for result in identifier.submit("report.pdf")? {
//!     println!("{} {} ({})", result.puid, result.name, result.method);
//! }
//! # Ok::<(), pronto::Error>(())
//! ```

pub mod config;
pub mod identifier;

pub use config::IdentifierConfig;
pub use identifier::{ApiResult, Identifier, IdentifierBuilder};
