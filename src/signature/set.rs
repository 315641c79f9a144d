//! The compiled signature set: catalogue, signatures and extension indexes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, trace, warn};

use super::catalogue::{ExtensionIndex, FormatCatalogue};
use super::format::FileFormat;
use super::hit::{Hit, RawHitType};
use super::internal::{InternalSignature, InternalSignatureDef};
use crate::common::budget::ScanBudget;
use crate::common::error::Result;
use crate::common::request::IdentificationRequest;

#[derive(Debug)]
enum PendingSignature {
    Definition(InternalSignatureDef),
    Compiled(InternalSignature),
}

/// Collects formats and signatures before they are frozen into a [`SignatureSet`].
#[derive(Debug, Default)]
pub struct SignatureSetBuilder {
    catalogue: FormatCatalogue,
    signatures: Vec<PendingSignature>,
    version: String,
    date_created: String,
}

impl SignatureSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_date_created(mut self, date_created: impl Into<String>) -> Self {
        self.date_created = date_created.into();
        self
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    pub fn set_date_created(&mut self, date_created: impl Into<String>) {
        self.date_created = date_created.into();
    }

    pub fn add_format(&mut self, format: FileFormat) -> usize {
        self.catalogue.add_format(format)
    }

    /// Add an already compiled signature.
    pub fn add_signature(&mut self, signature: InternalSignature) {
        self.signatures.push(PendingSignature::Compiled(signature));
    }

    /// Add a signature to be compiled by [`prepare_for_use`](Self::prepare_for_use).
    pub fn add_signature_def(&mut self, signature: InternalSignatureDef) {
        self.signatures.push(PendingSignature::Definition(signature));
    }

    pub fn catalogue(&self) -> &FormatCatalogue {
        &self.catalogue
    }

    /// Compile, bind, sort and index everything into an immutable set.
    ///
    /// Signatures that fail to compile are dropped with a warning. Formats
    /// keep their reference to a dropped signature id, so they are still not
    /// treated as extension-only.
    pub fn prepare_for_use(self) -> SignatureSet {
        let mut signatures = Vec::with_capacity(self.signatures.len());
        let mut dropped = HashSet::new();
        for pending in self.signatures {
            match pending {
                PendingSignature::Compiled(signature) => signatures.push(signature),
                PendingSignature::Definition(def) => match def.compile() {
                    Ok(signature) => signatures.push(signature),
                    Err(reason) => {
                        warn!("Removing invalid signature [id:{}]: {}", def.id, reason);
                        dropped.insert(def.id);
                    },
                },
            }
        }

        let by_id: HashMap<i32, usize> = signatures
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id(), i))
            .collect();
        for (position, format) in self.catalogue.all_formats().iter().enumerate() {
            for signature_id in format.internal_signature_ids() {
                match by_id.get(signature_id) {
                    Some(&i) => signatures[i].bind_format(position),
                    None if dropped.contains(signature_id) => {},
                    None => warn!(
                        "Format {} references unknown signature id {}",
                        format.puid(),
                        signature_id
                    ),
                }
            }
        }

        signatures.sort_by_key(InternalSignature::sort_order);
        for signature in &signatures {
            if signature.is_variable_only() {
                warn!(
                    "Signature [id:{}] only has variable sequences and may be slow to match",
                    signature.id()
                );
            }
        }

        let extensions = self.catalogue.build_extension_index();
        debug!(
            "Prepared signature set {}: {} formats, {} signatures",
            self.version,
            self.catalogue.len(),
            signatures.len()
        );
        SignatureSet {
            catalogue: self.catalogue,
            signatures,
            extensions,
            version: self.version,
            date_created: self.date_created,
        }
    }
}

/// Immutable, shareable signature set.
///
/// All methods take `&self`; a set is safe to match against from many
/// threads at once. Overrides produce a new set instead of mutating this one.
#[derive(Debug, Clone)]
pub struct SignatureSet {
    catalogue: FormatCatalogue,
    signatures: Vec<InternalSignature>,
    extensions: ExtensionIndex,
    version: String,
    date_created: String,
}

impl SignatureSet {
    pub fn builder() -> SignatureSetBuilder {
        SignatureSetBuilder::new()
    }

    pub fn catalogue(&self) -> &FormatCatalogue {
        &self.catalogue
    }

    /// Compiled signatures in evaluation order.
    pub fn signatures(&self) -> &[InternalSignature] {
        &self.signatures
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn date_created(&self) -> &str {
        &self.date_created
    }

    /// Run every signature against the request.
    ///
    /// Each matching signature yields one hit per bound format.
    pub fn identify(
        &self,
        request: &dyn IdentificationRequest,
        budget: ScanBudget,
    ) -> Result<Vec<Hit>> {
        let mut hits = Vec::new();
        if request.size() == 0 {
            return Ok(hits);
        }
        for signature in &self.signatures {
            if signature.formats().is_empty() {
                continue;
            }
            let matched = signature.matches(request, budget)?;
            trace!(
                "Signature [id:{}] {} {}",
                signature.id(),
                if matched { "matched" } else { "did not match" },
                request.file_name()
            );
            if !matched {
                continue;
            }
            for &position in signature.formats() {
                if let Some(format) = self.catalogue.get(position) {
                    hits.push(Hit::new(
                        Arc::clone(format),
                        RawHitType::PositiveGenericOrSpecific,
                        signature.is_specific(),
                        None,
                    ));
                }
            }
        }
        Ok(hits)
    }

    /// Every format declaring `extension`, ignoring case.
    pub fn formats_for_extension(&self, extension: &str) -> Vec<Arc<FileFormat>> {
        self.formats_at(self.extensions.all_for(extension))
    }

    /// Formats declaring `extension` that have no internal signatures.
    pub fn tentative_formats_for_extension(&self, extension: &str) -> Vec<Arc<FileFormat>> {
        self.formats_at(self.extensions.tentative_for(extension))
    }

    fn formats_at(&self, positions: &[usize]) -> Vec<Arc<FileFormat>> {
        positions
            .iter()
            .filter_map(|&p| self.catalogue.get(p).cloned())
            .collect()
    }

    /// A copy of this set with binary detection disabled for `puid`.
    ///
    /// The format's signature ids are cleared and it is unbound from those
    /// signatures; signatures left with no format are dropped. The format is
    /// also withdrawn from extension-only matching, as something else (usually
    /// a container signature) now identifies it. Returns `None` when `puid` is
    /// not in the catalogue.
    pub fn with_signature_override(&self, puid: &str) -> Option<SignatureSet> {
        let position = self.catalogue.index_of_puid(puid)?;
        let mut format = FileFormat::clone(self.catalogue.get(position)?);
        let removed = format.clear_signatures();

        let mut next = self.clone();
        next.extensions.remove_tentative(&format, position);
        next.catalogue.replace(position, format);
        for signature in &mut next.signatures {
            if removed.contains(&signature.id()) {
                signature.unbind_format(position);
            }
        }
        next.signatures.retain(|s| !s.formats().is_empty());
        debug!(
            "Signature override for {}: {} signature(s) unbound, {} remain",
            puid,
            removed.len(),
            next.signatures.len()
        );
        Some(next)
    }
}
