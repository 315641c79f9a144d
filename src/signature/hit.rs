//! Signature hits produced by matching a compiled signature set.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::format::FileFormat;

/// Kind of hit as reported by the matcher, before specificity is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHitType {
    PositiveSpecific,
    PositiveGeneric,
    Tentative,
    /// Positive, with specificity decided by the signature's flag.
    PositiveGenericOrSpecific,
}

/// Resolved kind of a hit. Never ambiguous once a [`Hit`] exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HitType {
    PositiveSpecific,
    PositiveGeneric,
    Tentative,
}

impl HitType {
    /// Collapse a raw hit type using the matcher's specificity flag.
    pub fn resolve(raw: RawHitType, specific: bool) -> Self {
        match raw {
            RawHitType::PositiveSpecific => HitType::PositiveSpecific,
            RawHitType::PositiveGeneric => HitType::PositiveGeneric,
            RawHitType::Tentative => HitType::Tentative,
            RawHitType::PositiveGenericOrSpecific if specific => HitType::PositiveSpecific,
            RawHitType::PositiveGenericOrSpecific => HitType::PositiveGeneric,
        }
    }

    pub fn is_positive(self) -> bool {
        !matches!(self, HitType::Tentative)
    }
}

impl fmt::Display for HitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HitType::PositiveSpecific => "Positive (Specific Format)",
            HitType::PositiveGeneric => "Positive (Generic Format)",
            HitType::Tentative => "Tentative",
        })
    }
}

/// One match of a signature against a resource.
#[derive(Debug, Clone)]
pub struct Hit {
    format: Arc<FileFormat>,
    hit_type: HitType,
    warning: Option<String>,
}

impl Hit {
    pub fn new(
        format: Arc<FileFormat>,
        raw: RawHitType,
        specific: bool,
        warning: Option<String>,
    ) -> Self {
        Self {
            format,
            hit_type: HitType::resolve(raw, specific),
            warning: warning.filter(|w| !w.is_empty()),
        }
    }

    pub fn format(&self) -> &Arc<FileFormat> {
        &self.format
    }

    pub fn hit_type(&self) -> HitType {
        self.hit_type
    }

    pub fn is_specific(&self) -> bool {
        self.hit_type == HitType::PositiveSpecific
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_or_specific_collapses() {
        let format = Arc::new(FileFormat::new(1, "fmt/1"));
        let specific = Hit::new(format.clone(), RawHitType::PositiveGenericOrSpecific, true, None);
        let generic = Hit::new(format.clone(), RawHitType::PositiveGenericOrSpecific, false, None);
        assert_eq!(specific.hit_type(), HitType::PositiveSpecific);
        assert!(specific.is_specific());
        assert_eq!(generic.hit_type(), HitType::PositiveGeneric);
        assert!(!generic.is_specific());
    }

    #[test]
    fn test_explicit_types_ignore_specificity() {
        assert_eq!(HitType::resolve(RawHitType::Tentative, true), HitType::Tentative);
        assert_eq!(HitType::resolve(RawHitType::PositiveGeneric, true), HitType::PositiveGeneric);
        assert!(!HitType::Tentative.is_positive());
    }

    #[test]
    fn test_empty_warning_is_none() {
        let format = Arc::new(FileFormat::new(1, "fmt/1"));
        let hit = Hit::new(format, RawHitType::PositiveSpecific, false, Some(String::new()));
        assert_eq!(hit.warning(), None);
        assert_eq!(HitType::PositiveGeneric.to_string(), "Positive (Generic Format)");
    }
}
