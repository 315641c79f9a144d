//! Container identifiers, keyed by the family they handle.

use std::collections::HashMap;
use std::fmt;

use super::family::ContainerFamily;
use crate::common::error::{Error, Result};
use crate::common::request::IdentificationRequest;
use crate::identify::result::IdentificationResultCollection;

/// Identifies formats by looking inside a container (ZIP entries, OLE2
/// streams, ...).
///
/// Implementations receive the original request and a fresh, empty result
/// collection scoped to it, and return that collection filled with whatever
/// they identified. Returning it empty means "nothing found"; the binary
/// results are then kept.
pub trait ContainerIdentifier: Send + Sync {
    /// Family this identifier handles.
    fn family(&self) -> ContainerFamily;

    fn identify(
        &self,
        request: &dyn IdentificationRequest,
        results: IdentificationResultCollection,
    ) -> Result<IdentificationResultCollection>;
}

/// Container identifiers resolved once at start-up.
#[derive(Default)]
pub struct ContainerRegistry {
    identifiers: HashMap<ContainerFamily, Box<dyn ContainerIdentifier>>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identifier under its family, returning any it replaced.
    pub fn register(
        &mut self,
        identifier: Box<dyn ContainerIdentifier>,
    ) -> Option<Box<dyn ContainerIdentifier>> {
        self.identifiers.insert(identifier.family(), identifier)
    }

    pub fn get(&self, family: &ContainerFamily) -> Option<&dyn ContainerIdentifier> {
        self.identifiers.get(family).map(Box::as_ref)
    }

    pub fn contains(&self, family: &ContainerFamily) -> bool {
        self.identifiers.contains_key(family)
    }

    pub fn families(&self) -> impl Iterator<Item = &ContainerFamily> {
        self.identifiers.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Run the identifier registered for `family`.
    ///
    /// Fails with [`Error::UnknownContainerFamily`] when none is registered.
    pub fn identify(
        &self,
        family: &ContainerFamily,
        request: &dyn IdentificationRequest,
        results: IdentificationResultCollection,
    ) -> Result<IdentificationResultCollection> {
        let identifier = self
            .get(family)
            .ok_or_else(|| Error::UnknownContainerFamily(family.to_string()))?;
        identifier.identify(request, results)
    }
}

impl fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("families", &self.identifiers.keys().collect::<Vec<_>>())
            .finish()
    }
}
