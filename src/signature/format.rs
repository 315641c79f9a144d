//! File format definitions from the signature catalogue.

use std::collections::HashSet;

use serde::Serialize;

/// Normalise an extension for case-insensitive lookups.
#[inline]
pub(crate) fn extension_key(extension: &str) -> String {
    extension.to_ascii_uppercase()
}

/// One format from the signature catalogue.
///
/// `puid` is the stable, globally unique identifier shown to users; `id` is
/// local to the signature file and only used to wire priority edges and
/// signature bindings together.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileFormat {
    id: i32,
    puid: String,
    name: String,
    version: String,
    mime_type: String,
    extensions: Vec<String>,
    #[serde(skip)]
    extension_lookup: HashSet<String>,
    internal_signature_ids: Vec<i32>,
    priority_over: Vec<i32>,
}

impl FileFormat {
    /// Create a format with no extensions, signatures or priorities.
    pub fn new(id: i32, puid: impl Into<String>) -> Self {
        Self {
            id,
            puid: puid.into(),
            ..Self::default()
        }
    }

    /// Set the human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Declare an extension (kept with its declared casing).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.add_extension(extension);
        self
    }

    /// Declare that this format outranks the format with id `other`.
    pub fn with_priority_over(mut self, other: i32) -> Self {
        self.priority_over.push(other);
        self
    }

    /// Bind an internal signature id to this format.
    pub fn with_internal_signature(mut self, signature_id: i32) -> Self {
        self.internal_signature_ids.push(signature_id);
        self
    }

    pub(crate) fn set_identity(&mut self, id: i32, puid: String) {
        self.id = id;
        self.puid = puid;
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_version(&mut self, version: String) {
        self.version = version;
    }

    pub(crate) fn set_mime_type(&mut self, mime_type: String) {
        self.mime_type = mime_type;
    }

    pub(crate) fn add_extension(&mut self, extension: impl Into<String>) {
        let extension = extension.into();
        self.extension_lookup.insert(extension_key(&extension));
        self.extensions.push(extension);
    }

    pub(crate) fn add_priority_over(&mut self, other: i32) {
        self.priority_over.push(other);
    }

    pub(crate) fn add_internal_signature(&mut self, signature_id: i32) {
        self.internal_signature_ids.push(signature_id);
    }

    /// Remove every bound signature id, returning the ids that were removed.
    pub(crate) fn clear_signatures(&mut self) -> Vec<i32> {
        std::mem::take(&mut self.internal_signature_ids)
    }

    /// Catalogue-local id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Persistent unique identifier, e.g. `fmt/101`.
    pub fn puid(&self) -> &str {
        &self.puid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// MIME type; empty when none was declared.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Declared extensions in declaration order and casing.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn internal_signature_ids(&self) -> &[i32] {
        &self.internal_signature_ids
    }

    /// Ids of the formats this format outranks.
    pub fn priority_over(&self) -> &[i32] {
        &self.priority_over
    }

    /// Whether `extension` is declared for this format, ignoring case.
    pub fn has_matching_extension(&self, extension: &str) -> bool {
        self.extension_lookup.contains(&extension_key(extension))
    }

    /// Whether finding this format under `extension` should raise a mismatch.
    ///
    /// A format without declared extensions never mismatches. Otherwise a
    /// missing or empty extension mismatches, as does one that is not declared.
    pub fn has_extension_mismatch(&self, extension: Option<&str>) -> bool {
        if self.extensions.is_empty() {
            return false;
        }
        match extension {
            Some(ext) if !ext.is_empty() => !self.has_matching_extension(ext),
            _ => true,
        }
    }
}

impl PartialEq for FileFormat {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.puid == other.puid
    }
}

impl Eq for FileFormat {}
