//! Format catalogue and compiled binary signatures.
//!
//! A signature file is loaded into a [`SignatureSetBuilder`] by
//! [`load_catalogue`], then frozen with
//! [`SignatureSetBuilder::prepare_for_use`] into an immutable [`SignatureSet`]
//! that can be matched against from any number of threads.
//!
//! ```no_run
//! use pronto::signature::load_catalogue;
//! use pronto::common::{MemoryRequest, ScanBudget};
//!
//! let set = load_catalogue("DROID_SignatureFile_V120.xml")?.prepare_for_use();
//! let request = MemoryRequest::new("report.pdf", std::fs::read("report.pdf")?);
//! for hit in set.identify(&request, ScanBudget::Bytes(65536))? {
//!     println!("{} ({})", hit.format().puid(), hit.hit_type());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalogue;
pub mod format;
pub mod hit;
pub mod internal;
pub mod parser;
pub mod sequence;
pub mod set;

pub use catalogue::FormatCatalogue;
pub use format::FileFormat;
pub use hit::{Hit, HitType, RawHitType};
pub use internal::{InternalSignature, InternalSignatureDef, SortOrder};
pub use parser::{load_catalogue, parse_signature_file};
pub use sequence::{Anchor, ByteMatcher, ByteSequence, ByteSequenceDef, Fragment, SubSequence, SubSequenceDef};
pub use set::{SignatureSet, SignatureSetBuilder};
