//! The identification engine: binary signatures, container escalation,
//! priority suppression and extension evidence.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use fixedbitset::FixedBitSet;
use log::debug;
use parking_lot::RwLock;

use super::result::{IdentificationMethod, IdentificationResult, IdentificationResultCollection};
use crate::common::budget::ScanBudget;
use crate::common::error::{Error, Result};
use crate::common::request::IdentificationRequest;
use crate::container::{ContainerFamily, ContainerFormatResolver, ContainerRegistry};
use crate::signature::{SignatureSet, load_catalogue};

/// Identifies requests against a loaded signature set.
///
/// Loading happens once through [`init`](Self::init) (or
/// [`init_with`](Self::init_with)); afterwards every `match_*` call works on
/// an immutable snapshot, so the engine can be shared across threads. Until a
/// signature set is loaded, every operation that needs one fails with
/// [`Error::NotInitialized`].
///
/// Signature overrides and the scan budget are configuration: an override
/// swaps in a new snapshot and requests already in flight finish against the
/// old one.
#[derive(Debug)]
pub struct IdentificationEngine {
    signatures: RwLock<Option<Arc<SignatureSet>>>,
    max_bytes_to_scan: AtomicI64,
    resolver: ContainerFormatResolver,
    containers: ContainerRegistry,
}

impl Default for IdentificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentificationEngine {
    /// An engine with no signatures and no container escalation.
    pub fn new() -> Self {
        Self {
            signatures: RwLock::new(None),
            max_bytes_to_scan: AtomicI64::new(-1),
            resolver: ContainerFormatResolver::new(),
            containers: ContainerRegistry::new(),
        }
    }

    /// Escalate trigger puids using `resolver`, dispatching to `containers`.
    pub fn with_containers(
        mut self,
        resolver: ContainerFormatResolver,
        containers: ContainerRegistry,
    ) -> Self {
        self.resolver = resolver;
        self.containers = containers;
        self
    }

    /// Load a signature file and start serving it.
    ///
    /// On failure the engine keeps whatever it was serving before, which for a
    /// fresh engine means it stays uninitialised.
    pub fn init<P: AsRef<Path>>(&self, signature_file: P) -> Result<()> {
        let set = load_catalogue(signature_file)?.prepare_for_use();
        self.init_with(set);
        Ok(())
    }

    /// Serve an already prepared signature set.
    pub fn init_with(&self, set: SignatureSet) {
        debug!(
            "Serving signature set {} with {} formats",
            set.version(),
            set.catalogue().len()
        );
        *self.signatures.write() = Some(Arc::new(set));
    }

    pub fn is_initialized(&self) -> bool {
        self.signatures.read().is_some()
    }

    /// The snapshot currently being served.
    pub fn signature_set(&self) -> Result<Arc<SignatureSet>> {
        self.signatures.read().clone().ok_or(Error::NotInitialized)
    }

    /// Limit how far from the start or end of a resource signatures may read.
    /// Negative means unlimited.
    pub fn set_max_bytes_to_scan(&self, max_bytes: i64) {
        self.max_bytes_to_scan.store(max_bytes, Ordering::Relaxed);
    }

    pub fn max_bytes_to_scan(&self) -> i64 {
        self.max_bytes_to_scan.load(Ordering::Relaxed)
    }

    fn budget(&self) -> ScanBudget {
        ScanBudget::from(self.max_bytes_to_scan())
    }

    /// Disable binary detection of `puid` by swapping in a snapshot where its
    /// signatures are cleared.
    ///
    /// Returns `Ok(false)` if the puid is not catalogued; nothing changes then.
    pub fn set_signature_override(&self, puid: &str) -> Result<bool> {
        let mut guard = self.signatures.write();
        let current = guard.as_ref().ok_or(Error::NotInitialized)?;
        match current.with_signature_override(puid) {
            Some(next) => {
                *guard = Some(Arc::new(next));
                Ok(true)
            },
            None => {
                debug!("Signature override ignored for unknown puid {}", puid);
                Ok(false)
            },
        }
    }

    /// Full identification of one request.
    ///
    /// Binary signatures first; a trigger puid hands the request to the
    /// container identifier for its family, whose non-empty output replaces the
    /// binary results outright. Priority suppression then runs on whatever is
    /// left. An empty result falls back to extension matching; otherwise the
    /// extension is only checked for a mismatch.
    pub fn match_request(
        &self,
        request: &dyn IdentificationRequest,
        all_extensions: bool,
    ) -> Result<IdentificationResultCollection> {
        let set = self.signature_set()?;
        let mut results = binary_results(&set, request, self.budget())?;

        if let Some(family) = self.resolver.container_format_for(&results) {
            results = self.escalate(family, request, results)?;
        }

        if !results.is_empty() {
            remove_lower_priority(&set, &mut results);
        }

        if results.is_empty() {
            let by_extension = extension_results(&set, request, all_extensions);
            if !by_extension.is_empty() {
                results = by_extension;
            }
        } else {
            check_mismatches(&set, &mut results, request.extension());
        }
        Ok(results)
    }

    fn escalate(
        &self,
        family: &ContainerFamily,
        request: &dyn IdentificationRequest,
        binary: IdentificationResultCollection,
    ) -> Result<IdentificationResultCollection> {
        debug!("Escalating {} into {} container identification", request.file_name(), family);
        let fresh = IdentificationResultCollection::new(request);
        let container = self.containers.identify(family, request, fresh)?;
        if container.is_empty() {
            debug!("No container results for {}, keeping binary results", request.file_name());
            Ok(binary)
        } else {
            Ok(container)
        }
    }

    /// Run only the binary signatures.
    pub fn match_binary_signatures(
        &self,
        request: &dyn IdentificationRequest,
    ) -> Result<IdentificationResultCollection> {
        let set = self.signature_set()?;
        binary_results(&set, request, self.budget())
    }

    /// Identify by extension alone.
    ///
    /// With `all_extensions` every format declaring the extension is returned;
    /// otherwise only formats that have no internal signatures.
    pub fn match_extensions(
        &self,
        request: &dyn IdentificationRequest,
        all_extensions: bool,
    ) -> Result<IdentificationResultCollection> {
        let set = self.signature_set()?;
        Ok(extension_results(&set, request, all_extensions))
    }

    /// Drop results outranked by another result in the same collection.
    ///
    /// Returns how many results were removed. Running it again on its own
    /// output removes nothing.
    pub fn remove_lower_priority_hits(
        &self,
        results: &mut IdentificationResultCollection,
    ) -> Result<usize> {
        let set = self.signature_set()?;
        Ok(remove_lower_priority(&set, results))
    }

    /// Flag the collection if its formats disagree with `extension`.
    pub fn check_for_extension_mismatches(
        &self,
        results: &mut IdentificationResultCollection,
        extension: Option<&str>,
    ) -> Result<()> {
        let set = self.signature_set()?;
        check_mismatches(&set, results, extension);
        Ok(())
    }

    /// Container family of the first trigger puid in `results`.
    pub fn container_format_for(
        &self,
        results: &IdentificationResultCollection,
    ) -> Option<ContainerFamily> {
        self.resolver.container_format_for(results).cloned()
    }

    pub fn container_resolver(&self) -> &ContainerFormatResolver {
        &self.resolver
    }
}

fn binary_results(
    set: &SignatureSet,
    request: &dyn IdentificationRequest,
    budget: ScanBudget,
) -> Result<IdentificationResultCollection> {
    let mut results = IdentificationResultCollection::new(request);
    for hit in set.identify(request, budget)? {
        results.add_result(IdentificationResult::from_hit(&hit));
    }
    Ok(results)
}

fn extension_results(
    set: &SignatureSet,
    request: &dyn IdentificationRequest,
    all_extensions: bool,
) -> IdentificationResultCollection {
    let mut results = IdentificationResultCollection::new(request);
    let Some(extension) = request.extension().filter(|e| !e.is_empty()) else {
        return results;
    };
    let formats = if all_extensions {
        set.formats_for_extension(extension)
    } else {
        set.tentative_formats_for_extension(extension)
    };
    for format in formats {
        results.add_result(IdentificationResult::from_format(
            &format,
            IdentificationMethod::Extension,
        ));
    }
    results
}

fn remove_lower_priority(set: &SignatureSet, results: &mut IdentificationResultCollection) -> usize {
    let catalogue = set.catalogue();
    let formats: Vec<_> = results
        .results()
        .iter()
        .map(|r| catalogue.format_for_puid(r.puid()))
        .collect();

    let mut outranked = Vec::new();
    for format in formats.iter().flatten() {
        outranked.extend_from_slice(format.priority_over());
    }
    if outranked.is_empty() {
        return 0;
    }

    let mut remove = FixedBitSet::with_capacity(formats.len());
    for (index, format) in formats.iter().enumerate() {
        if let Some(format) = format
            && outranked.contains(&format.id())
        {
            debug!("Removing lower priority result {}", format.puid());
            remove.insert(index);
        }
    }

    let removed = remove.count_ones(..);
    let mut index = 0;
    results.retain(|_| {
        let keep = !remove.contains(index);
        index += 1;
        keep
    });
    removed
}

fn check_mismatches(
    set: &SignatureSet,
    results: &mut IdentificationResultCollection,
    extension: Option<&str>,
) {
    let catalogue = set.catalogue();
    let mismatch = results
        .results()
        .iter()
        .filter_map(|r| catalogue.format_for_puid(r.puid()))
        .any(|format| format.has_extension_mismatch(extension));
    if mismatch {
        results.flag_extension_mismatch();
    }
}
