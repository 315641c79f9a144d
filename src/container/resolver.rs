//! Trigger puid table: which binary identifications escalate into a container pass.

use std::collections::HashMap;

use super::family::ContainerFamily;
use crate::identify::result::IdentificationResultCollection;

/// Maps trigger puids to the container family they escalate into.
#[derive(Debug, Clone, Default)]
pub struct ContainerFormatResolver {
    triggers: HashMap<String, ContainerFamily>,
}

impl ContainerFormatResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the family a puid triggers.
    pub fn register_puid(&mut self, puid: impl Into<String>, family: ContainerFamily) {
        self.triggers.insert(puid.into(), family);
    }

    pub fn for_puid(&self, puid: &str) -> Option<&ContainerFamily> {
        self.triggers.get(puid)
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Family of the first result, in result order, whose puid is a trigger.
    pub fn container_format_for(
        &self,
        results: &IdentificationResultCollection,
    ) -> Option<&ContainerFamily> {
        results
            .results()
            .iter()
            .find_map(|result| self.for_puid(result.puid()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::request::MemoryRequest;
    use crate::identify::result::{IdentificationMethod, IdentificationResult};

    fn collection(puids: &[&str]) -> IdentificationResultCollection {
        let request = MemoryRequest::new("file.bin", vec![0u8; 4]);
        let mut results = IdentificationResultCollection::new(&request);
        for puid in puids {
            results.add_result(IdentificationResult::new(*puid, IdentificationMethod::BinarySignature));
        }
        results
    }

    #[test]
    fn test_first_trigger_in_result_order_wins() {
        let mut resolver = ContainerFormatResolver::new();
        resolver.register_puid("x-fmt/263", ContainerFamily::Zip);
        resolver.register_puid("fmt/111", ContainerFamily::Ole2);

        let results = collection(&["fmt/14", "fmt/111", "x-fmt/263"]);
        assert_eq!(resolver.container_format_for(&results), Some(&ContainerFamily::Ole2));

        let results = collection(&["x-fmt/263"]);
        assert_eq!(resolver.container_format_for(&results), Some(&ContainerFamily::Zip));
    }

    #[test]
    fn test_no_trigger() {
        let mut resolver = ContainerFormatResolver::new();
        assert_eq!(resolver.container_format_for(&collection(&["fmt/14"])), None);
        resolver.register_puid("x-fmt/263", ContainerFamily::Zip);
        assert_eq!(resolver.container_format_for(&collection(&[])), None);
        assert_eq!(resolver.len(), 1);
    }
}
