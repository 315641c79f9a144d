//! Pronto - file format identification against PRONOM-style signature files
//!
//! This library identifies the format of arbitrary files by matching their
//! bytes against a catalogue of format signatures, resolving overlapping
//! matches through declared format priorities, falling back to file
//! extensions, and escalating into container-aware identification when a
//! ZIP or OLE2 shell is found.
//!
//! # Features
//!
//! - **Signature files**: Load DROID/PRONOM `FFSignatureFile` XML catalogues
//! - **Binary matching**: BOF, EOF and floating byte sequences with a scan budget
//! - **Priority resolution**: Collapse generic matches behind more specific ones
//! - **Extension evidence**: Extension-only fallback and mismatch detection
//! - **Container escalation**: Hand ZIP/OLE2 files to pluggable container identifiers
//! - **Thread safe**: Immutable signature snapshots shared across worker threads
//!
//! # Example - Identifying a file
//!
//! ```no_run
//! use pronto::api::Identifier;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let identifier = Identifier::builder()
//!     .binary_signature("DROID_SignatureFile_V120.xml")
//!     .build()?;
//!
//! for result in identifier.submit("report.pdf")? {
//!     println!("{}: {} via {}", result.puid, result.name, result.method);
//!     if result.extension_mismatch {
//!         println!("  extension does not match the identified format");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Using the engine directly
//!
//! ```no_run
//! use pronto::common::MemoryRequest;
//! use pronto::identify::IdentificationEngine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = IdentificationEngine::new();
//! engine.init("DROID_SignatureFile_V120.xml")?;
//! engine.set_max_bytes_to_scan(65536);
//!
//! let request = MemoryRequest::new("scan.tif", std::fs::read("scan.tif")?);
//! let results = engine.match_request(&request, false)?;
//! for result in results.results() {
//!     println!("{} ({})", result.puid(), result.method());
//! }
//! # Ok(())
//! # }
//! ```

/// Common types: errors, requests and the scan budget
pub mod common;

/// Format catalogue, compiled signatures and the signature file loader
pub mod signature;

/// Container family labels, trigger puids and container identifiers
pub mod container;

/// Identification engine and result model
pub mod identify;

/// File-level identification façade and YAML configuration
pub mod api;

// Re-export commonly used types for convenience
pub use common::{Error, Result};
pub use identify::{IdentificationEngine, IdentificationMethod, IdentificationResult, IdentificationResultCollection};
