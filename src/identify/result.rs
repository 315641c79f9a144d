//! Externally visible identification results.

use std::fmt;

use serde::Serialize;

use crate::common::request::{IdentificationRequest, RequestMetaData};
use crate::signature::{FileFormat, Hit};

/// How a result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IdentificationMethod {
    BinarySignature,
    ContainerSignature,
    Extension,
}

impl fmt::Display for IdentificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdentificationMethod::BinarySignature => "Signature",
            IdentificationMethod::ContainerSignature => "Container",
            IdentificationMethod::Extension => "Extension",
        })
    }
}

/// One candidate format for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentificationResult {
    puid: String,
    name: String,
    version: String,
    mime_type: String,
    method: IdentificationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl IdentificationResult {
    /// A result carrying only a puid, as container identifiers usually report.
    pub fn new(puid: impl Into<String>, method: IdentificationMethod) -> Self {
        Self {
            puid: puid.into(),
            name: String::new(),
            version: String::new(),
            mime_type: String::new(),
            method,
            warning: None,
        }
    }

    /// A result describing a catalogued format.
    pub fn from_format(format: &FileFormat, method: IdentificationMethod) -> Self {
        Self {
            puid: format.puid().to_string(),
            name: format.name().to_string(),
            version: format.version().to_string(),
            mime_type: format.mime_type().to_string(),
            method,
            warning: None,
        }
    }

    /// Wrap a binary signature hit.
    pub fn from_hit(hit: &Hit) -> Self {
        let mut result = Self::from_format(hit.format(), IdentificationMethod::BinarySignature);
        result.warning = hit.warning().map(str::to_string);
        result
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        let warning = warning.into();
        self.warning = (!warning.is_empty()).then_some(warning);
        self
    }

    pub fn puid(&self) -> &str {
        &self.puid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn method(&self) -> IdentificationMethod {
        self.method
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }
}

/// Results for a single request, plus what is known about the request.
///
/// Results keep insertion order and are never deduplicated implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentificationResultCollection {
    results: Vec<IdentificationResult>,
    file_length: u64,
    metadata: RequestMetaData,
    extension_mismatch: bool,
}

impl IdentificationResultCollection {
    /// An empty collection scoped to `request`.
    pub fn new(request: &dyn IdentificationRequest) -> Self {
        Self {
            results: Vec::new(),
            file_length: request.size(),
            metadata: request.metadata().clone(),
            extension_mismatch: false,
        }
    }

    pub fn add_result(&mut self, result: IdentificationResult) {
        self.results.push(result);
    }

    /// Remove the first result equal to `result`. Returns whether one was removed.
    pub fn remove_result(&mut self, result: &IdentificationResult) -> bool {
        match self.results.iter().position(|r| r == result) {
            Some(index) => {
                self.results.remove(index);
                true
            },
            None => false,
        }
    }

    /// Keep only results for which `keep` returns true.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&IdentificationResult) -> bool,
    {
        self.results.retain(keep);
    }

    pub fn results(&self) -> &[IdentificationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<IdentificationResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    pub fn set_file_length(&mut self, file_length: u64) {
        self.file_length = file_length;
    }

    pub fn metadata(&self) -> &RequestMetaData {
        &self.metadata
    }

    pub fn extension_mismatch(&self) -> bool {
        self.extension_mismatch
    }

    /// Raise the mismatch flag. Once raised it stays raised.
    pub fn flag_extension_mismatch(&mut self) {
        self.extension_mismatch = true;
    }
}

impl<'a> IntoIterator for &'a IdentificationResultCollection {
    type Item = &'a IdentificationResult;
    type IntoIter = std::slice::Iter<'a, IdentificationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
