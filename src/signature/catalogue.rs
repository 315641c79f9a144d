//! Catalogue of file formats and their extension indexes.

use std::collections::HashMap;
use std::sync::Arc;

use super::format::{FileFormat, extension_key};

/// Ordered collection of formats, indexed by puid and by catalogue id.
///
/// Built once while a signature file is loaded and read-only afterwards. If
/// two formats share a puid the later one wins the index; rejecting such
/// files is the loader's job.
#[derive(Debug, Clone, Default)]
pub struct FormatCatalogue {
    formats: Vec<Arc<FileFormat>>,
    by_puid: HashMap<String, usize>,
    by_id: HashMap<i32, usize>,
}

impl FormatCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a format and index it, returning its position.
    pub fn add_format(&mut self, format: FileFormat) -> usize {
        let index = self.formats.len();
        self.by_puid.insert(format.puid().to_string(), index);
        self.by_id.insert(format.id(), index);
        self.formats.push(Arc::new(format));
        index
    }

    pub fn format_for_puid(&self, puid: &str) -> Option<&Arc<FileFormat>> {
        self.by_puid.get(puid).map(|&i| &self.formats[i])
    }

    pub fn format_for_id(&self, id: i32) -> Option<&Arc<FileFormat>> {
        self.by_id.get(&id).map(|&i| &self.formats[i])
    }

    /// All formats in insertion order.
    pub fn all_formats(&self) -> &[Arc<FileFormat>] {
        &self.formats
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Arc<FileFormat>> {
        self.formats.get(index)
    }

    pub(crate) fn index_of_puid(&self, puid: &str) -> Option<usize> {
        self.by_puid.get(puid).copied()
    }

    /// Swap the format stored at `index`, keeping its position and indexes.
    pub(crate) fn replace(&mut self, index: usize, format: FileFormat) {
        self.formats[index] = Arc::new(format);
    }

    /// Index every format by extension, and separately the formats that carry
    /// no internal signatures at all (the only ones extension evidence may
    /// surface without `all_extensions`).
    pub(crate) fn build_extension_index(&self) -> ExtensionIndex {
        let mut index = ExtensionIndex::default();
        for (position, format) in self.formats.iter().enumerate() {
            let tentative = format.internal_signature_ids().is_empty();
            for extension in format.extensions() {
                let key = extension_key(extension);
                if tentative {
                    index.tentative.entry(key.clone()).or_default().push(position);
                }
                index.all.entry(key).or_default().push(position);
            }
        }
        index
    }
}

/// Formats per upper-cased extension.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExtensionIndex {
    all: HashMap<String, Vec<usize>>,
    tentative: HashMap<String, Vec<usize>>,
}

impl ExtensionIndex {
    pub(crate) fn all_for(&self, extension: &str) -> &[usize] {
        self.all
            .get(&extension_key(extension))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn tentative_for(&self, extension: &str) -> &[usize] {
        self.tentative
            .get(&extension_key(extension))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Drop a format from the tentative lists; lists left empty are removed.
    pub(crate) fn remove_tentative(&mut self, format: &FileFormat, position: usize) {
        for extension in format.extensions() {
            let key = extension_key(extension);
            if let Some(list) = self.tentative.get_mut(&key) {
                list.retain(|&p| p != position);
                if list.is_empty() {
                    self.tentative.remove(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FormatCatalogue {
        let mut catalogue = FormatCatalogue::new();
        catalogue.add_format(FileFormat::new(1, "x-fmt/111").with_extension("txt"));
        catalogue.add_format(
            FileFormat::new(2, "fmt/101")
                .with_extension("XML")
                .with_extension("txt")
                .with_internal_signature(5),
        );
        catalogue
    }

    #[test]
    fn test_lookup_by_puid_and_id() {
        let catalogue = sample();
        assert_eq!(catalogue.len(), 2);
        assert_eq!(catalogue.format_for_puid("fmt/101").unwrap().id(), 2);
        assert_eq!(catalogue.format_for_id(1).unwrap().puid(), "x-fmt/111");
        assert!(catalogue.format_for_puid("fmt/999").is_none());
        let puids: Vec<_> = catalogue.all_formats().iter().map(|f| f.puid()).collect();
        assert_eq!(puids, ["x-fmt/111", "fmt/101"]);
    }

    #[test]
    fn test_colliding_puid_last_write_wins() {
        let mut catalogue = sample();
        catalogue.add_format(FileFormat::new(3, "fmt/101").with_name("later"));
        assert_eq!(catalogue.format_for_puid("fmt/101").unwrap().name(), "later");
        assert_eq!(catalogue.len(), 3);
    }

    #[test]
    fn test_extension_index_separates_tentative_formats() {
        let catalogue = sample();
        let index = catalogue.build_extension_index();
        assert_eq!(index.all_for("TXT"), &[0, 1]);
        assert_eq!(index.tentative_for("txt"), &[0]);
        assert_eq!(index.all_for("xml"), &[1]);
        assert!(index.tentative_for("xml").is_empty());
        assert!(index.all_for("pdf").is_empty());
    }

    #[test]
    fn test_remove_tentative_drops_empty_lists() {
        let catalogue = sample();
        let mut index = catalogue.build_extension_index();
        let format = catalogue.get(0).unwrap().clone();
        index.remove_tentative(&format, 0);
        assert!(index.tentative_for("txt").is_empty());
        assert_eq!(index.all_for("txt"), &[0, 1]);
    }
}
