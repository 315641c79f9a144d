//! File identification façade over the engine and container escalation.

use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use super::config::IdentifierConfig;
use crate::common::error::{Error, Result};
use crate::common::request::{FileRequest, IdentificationRequest};
use crate::container::{ContainerDefinitions, ContainerIdentifier, ContainerRegistry};
use crate::identify::{IdentificationEngine, IdentificationMethod, IdentificationResult};

/// One identification of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResult {
    pub extension: Option<String>,
    pub method: IdentificationMethod,
    pub puid: String,
    pub name: String,
    pub extension_mismatch: bool,
    pub path: PathBuf,
}

impl ApiResult {
    fn new(
        result: &IdentificationResult,
        extension: Option<&str>,
        extension_mismatch: bool,
        path: &Path,
    ) -> Self {
        Self {
            extension: extension.map(str::to_string),
            method: result.method(),
            puid: result.puid().to_string(),
            name: result.name().to_string(),
            extension_mismatch,
            path: path.to_path_buf(),
        }
    }
}

/// Builder for [`Identifier`].
#[derive(Default)]
pub struct IdentifierBuilder {
    binary_signature: Option<PathBuf>,
    container_signature: Option<PathBuf>,
    identifiers: Vec<Box<dyn ContainerIdentifier>>,
    max_bytes_to_scan: i64,
    match_all_extensions: bool,
}

impl IdentifierBuilder {
    fn new() -> Self {
        Self {
            max_bytes_to_scan: -1,
            ..Self::default()
        }
    }

    /// Binary signature file (required).
    pub fn binary_signature(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_signature = Some(path.into());
        self
    }

    pub fn container_signature(mut self, path: impl Into<PathBuf>) -> Self {
        self.container_signature = Some(path.into());
        self
    }

    /// Register a container identifier. Later registrations for the same
    /// family replace earlier ones.
    pub fn container_identifier(mut self, identifier: Box<dyn ContainerIdentifier>) -> Self {
        self.identifiers.push(identifier);
        self
    }

    pub fn max_bytes_to_scan(mut self, max_bytes: i64) -> Self {
        self.max_bytes_to_scan = max_bytes;
        self
    }

    pub fn match_all_extensions(mut self, all: bool) -> Self {
        self.match_all_extensions = all;
        self
    }

    /// Load the signature files and assemble the identifier.
    ///
    /// Every format a container signature can identify has its binary
    /// signatures overridden. Trigger puids are only wired up for families
    /// with a registered identifier, so files of other families keep their
    /// binary identification.
    pub fn build(self) -> Result<Identifier> {
        let binary_signature = self.binary_signature.ok_or_else(|| {
            Error::InvalidConfig("a binary signature file is required".to_string())
        })?;

        let mut registry = ContainerRegistry::new();
        for identifier in self.identifiers {
            registry.register(identifier);
        }

        let definitions = self
            .container_signature
            .as_ref()
            .map(ContainerDefinitions::load)
            .transpose()?;

        let mut engine = IdentificationEngine::new();
        if let Some(definitions) = &definitions {
            let resolver = definitions.resolver(|family| registry.contains(family));
            engine = engine.with_containers(resolver, registry);
        }
        engine.init(&binary_signature)?;
        engine.set_max_bytes_to_scan(self.max_bytes_to_scan);

        if let Some(definitions) = &definitions {
            for puid in definitions.mapped_puids() {
                engine.set_signature_override(puid)?;
            }
        }

        let binary_version = engine.signature_set()?.version().to_string();
        debug!(
            "Identifier ready: binary signatures {}, container signatures {:?}",
            binary_version,
            definitions.as_ref().and_then(|d| d.version())
        );
        Ok(Identifier {
            engine,
            match_all_extensions: self.match_all_extensions,
            binary_version,
            container_version: definitions.and_then(|d| d.version().map(str::to_string)),
        })
    }
}

/// Identifies files on disk.
pub struct Identifier {
    engine: IdentificationEngine,
    match_all_extensions: bool,
    binary_version: String,
    container_version: Option<String>,
}

impl Identifier {
    pub fn builder() -> IdentifierBuilder {
        IdentifierBuilder::new()
    }

    /// Build from a configuration, without container identifiers.
    pub fn from_config(config: &IdentifierConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .binary_signature(&config.binary_signature_file)
            .max_bytes_to_scan(config.max_bytes_to_scan.into())
            .match_all_extensions(config.match_all_extensions);
        if let Some(container) = &config.container_signature_file {
            builder = builder.container_signature(container);
        }
        builder.build()
    }

    /// Identify one file. The file is closed before this returns.
    pub fn submit<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ApiResult>> {
        let path = path.as_ref();
        let mut request = FileRequest::open(path)?;
        let outcome = self.engine.match_request(&request, self.match_all_extensions);
        let closed = request.close();
        let results = outcome?;
        closed?;

        let extension = request.extension();
        Ok(results
            .results()
            .iter()
            .map(|r| ApiResult::new(r, extension, results.extension_mismatch(), path))
            .collect())
    }

    /// Identify many files in parallel. A failure for one path does not
    /// affect the others.
    pub fn submit_many<P>(&self, paths: &[P]) -> Vec<(PathBuf, Result<Vec<ApiResult>>)>
    where
        P: AsRef<Path> + Sync,
    {
        paths
            .par_iter()
            .map(|path| (path.as_ref().to_path_buf(), self.submit(path)))
            .collect()
    }

    pub fn engine(&self) -> &IdentificationEngine {
        &self.engine
    }

    pub fn binary_signature_version(&self) -> &str {
        &self.binary_version
    }

    pub fn container_signature_version(&self) -> Option<&str> {
        self.container_version.as_deref()
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identifier")
            .field("binary_version", &self.binary_version)
            .field("container_version", &self.container_version)
            .field("match_all_extensions", &self.match_all_extensions)
            .finish()
    }
}
