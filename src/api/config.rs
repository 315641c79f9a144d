//! YAML configuration for [`Identifier`](super::Identifier).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::budget::ScanBudget;
use crate::common::error::{Error, Result};

/// Everything needed to build an identifier.
///
/// ```yaml
/// binary_signature_file: /opt/pronom/DROID_SignatureFile_V120.xml
/// container_signature_file: /opt/pronom/container-signature-20240715.xml
/// max_bytes_to_scan: 65536
/// match_all_extensions: false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierConfig {
    pub binary_signature_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_signature_file: Option<PathBuf>,
    /// Negative (the default) means unlimited.
    #[serde(default)]
    pub max_bytes_to_scan: ScanBudget,
    #[serde(default)]
    pub match_all_extensions: bool,
}

impl IdentifierConfig {
    pub fn new(binary_signature_file: impl Into<PathBuf>) -> Self {
        Self {
            binary_signature_file: binary_signature_file.into(),
            container_signature_file: None,
            max_bytes_to_scan: ScanBudget::Unlimited,
            match_all_extensions: false,
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_saphyr::from_str(yaml).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize configuration: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        if self.binary_signature_file.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "binary_signature_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
