//! Identification of requests against a signature set.

pub mod engine;
pub mod result;


pub use engine::IdentificationEngine;
pub use result::{IdentificationMethod, IdentificationResult, IdentificationResultCollection};
