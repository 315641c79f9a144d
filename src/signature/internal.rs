//! Internal signatures: one or more byte sequences that must all match.

use std::sync::Arc;

use bitflags::bitflags;

use super::sequence::{Anchor, ByteMatcher, ByteSequenceDef};
use crate::common::budget::ScanBudget;
use crate::common::error::Result;
use crate::common::request::IdentificationRequest;

bitflags! {
    /// Kinds of byte sequence a signature contains.
    ///
    /// The numeric value orders signatures from cheapest to most expensive to
    /// evaluate: anchored-at-start first, anchored-at-end last.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SortOrder: u8 {
        const BOF_SINGLE = 1 << 1;
        const BOF_MULTI = 1 << 2;
        const VARIABLE = 1 << 3;
        const EOF_SINGLE = 1 << 4;
        const EOF_MULTI = 1 << 5;
    }
}

/// Uncompiled signature as read from a signature file.
#[derive(Debug, Clone, Default)]
pub struct InternalSignatureDef {
    pub id: i32,
    pub specific: bool,
    pub sequences: Vec<ByteSequenceDef>,
}

impl InternalSignatureDef {
    /// Compile every byte sequence. Any failure invalidates the whole signature.
    pub fn compile(&self) -> std::result::Result<InternalSignature, String> {
        if self.sequences.is_empty() {
            return Err("signature has no byte sequences".to_string());
        }
        let mut signature = InternalSignature::new(self.id, self.specific);
        for def in &self.sequences {
            signature.sequences.push(Arc::new(def.compile()?));
        }
        Ok(signature)
    }
}

/// A compiled signature bound to the formats it identifies.
#[derive(Debug, Clone)]
pub struct InternalSignature {
    id: i32,
    specific: bool,
    sequences: Vec<Arc<dyn ByteMatcher>>,
    /// Catalogue positions of the bound formats.
    formats: Vec<usize>,
}

impl InternalSignature {
    pub fn new(id: i32, specific: bool) -> Self {
        Self {
            id,
            specific,
            sequences: Vec::new(),
            formats: Vec::new(),
        }
    }

    /// Add a byte matcher; every matcher must succeed for the signature to hit.
    pub fn with_matcher(mut self, matcher: Arc<dyn ByteMatcher>) -> Self {
        self.sequences.push(matcher);
        self
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Whether hits from this signature identify a specific format.
    pub fn is_specific(&self) -> bool {
        self.specific
    }

    pub fn sequences(&self) -> &[Arc<dyn ByteMatcher>] {
        &self.sequences
    }

    pub(crate) fn formats(&self) -> &[usize] {
        &self.formats
    }

    pub(crate) fn bind_format(&mut self, position: usize) {
        if !self.formats.contains(&position) {
            self.formats.push(position);
        }
    }

    pub(crate) fn unbind_format(&mut self, position: usize) {
        self.formats.retain(|&p| p != position);
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sequences
            .iter()
            .fold(SortOrder::empty(), |order, sequence| {
                order
                    | match (sequence.anchor(), sequence.parts() > 1) {
                        (Anchor::Bof, false) => SortOrder::BOF_SINGLE,
                        (Anchor::Bof, true) => SortOrder::BOF_MULTI,
                        (Anchor::Variable, _) => SortOrder::VARIABLE,
                        (Anchor::Eof, false) => SortOrder::EOF_SINGLE,
                        (Anchor::Eof, true) => SortOrder::EOF_MULTI,
                    }
            })
    }

    /// True when the signature has no anchored sequence to bound the search.
    pub fn is_variable_only(&self) -> bool {
        self.sort_order() == SortOrder::VARIABLE
    }

    /// Evaluate the signature, stopping at the first sequence that fails.
    pub fn matches(&self, request: &dyn IdentificationRequest, budget: ScanBudget) -> Result<bool> {
        if self.sequences.is_empty() {
            return Ok(false);
        }
        for sequence in &self.sequences {
            if !sequence.matches(request, budget)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::request::MemoryRequest;
    use crate::signature::sequence::SubSequenceDef;

    fn def(reference: &str, text: &str) -> ByteSequenceDef {
        ByteSequenceDef {
            reference: reference.to_string(),
            subsequences: vec![SubSequenceDef {
                position: 1,
                max_offset: Some(0),
                sequence: text.to_string(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_all_sequences_must_match() {
        let signature = InternalSignatureDef {
            id: 1,
            specific: true,
            sequences: vec![def("BOFoffset", "2550"), def("EOFoffset", "0A")],
        }
        .compile()
        .unwrap();
        let pdf = MemoryRequest::new("a.pdf", b"%PDF-1.4 ... %%EOF\n".to_vec());
        let truncated = MemoryRequest::new("b.pdf", b"%PDF-1.4".to_vec());
        assert!(signature.matches(&pdf, ScanBudget::Unlimited).unwrap());
        assert!(!signature.matches(&truncated, ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_sort_order_classification() {
        let bof = InternalSignatureDef {
            id: 1,
            sequences: vec![def("BOFoffset", "00")],
            ..Default::default()
        }
        .compile()
        .unwrap();
        let variable = InternalSignatureDef {
            id: 2,
            sequences: vec![def("Variable", "00")],
            ..Default::default()
        }
        .compile()
        .unwrap();
        let mixed = InternalSignatureDef {
            id: 3,
            sequences: vec![def("Variable", "00"), def("EOFoffset", "00")],
            ..Default::default()
        }
        .compile()
        .unwrap();
        assert_eq!(bof.sort_order(), SortOrder::BOF_SINGLE);
        assert!(variable.is_variable_only());
        assert!(!mixed.is_variable_only());
        assert!(bof.sort_order() < variable.sort_order());
        assert!(variable.sort_order() < mixed.sort_order());
    }

    #[test]
    fn test_empty_signature_is_invalid() {
        assert!(InternalSignatureDef::default().compile().is_err());
        let bad = InternalSignatureDef {
            id: 9,
            sequences: vec![def("BOFoffset", "{4}")],
            ..Default::default()
        };
        assert!(bad.compile().is_err());
    }
}
