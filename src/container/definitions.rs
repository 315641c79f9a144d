//! Container signature file loader.
//!
//! Only the parts the identification engine needs are read: which binary
//! formats trigger a container pass, and which puids container signatures
//! resolve to. The container signatures themselves belong to the
//! container-specific identifiers and are skipped.

use std::path::Path;

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::family::ContainerFamily;
use super::resolver::ContainerFormatResolver;
use crate::common::error::{Error, Result};
use crate::signature::parser::attributes;

const ROOT_ELEMENT: &str = "ContainerSignatureMapping";

/// A binary format whose identification escalates into a container pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPuid {
    pub puid: String,
    pub family: ContainerFamily,
}

/// Binding of a container signature to the format it identifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFormatMapping {
    pub signature_id: i32,
    pub puid: String,
}

/// Contents of a container signature file relevant to escalation.
#[derive(Debug, Clone, Default)]
pub struct ContainerDefinitions {
    version: Option<String>,
    triggers: Vec<TriggerPuid>,
    mappings: Vec<FileFormatMapping>,
}

impl ContainerDefinitions {
    /// Load from disk. A missing file is [`Error::FileNotFound`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let xml = std::fs::read(path).map_err(|e| {
            debug!("Cannot read container signature file {}: {}", path.display(), e);
            Error::FileNotFound(path.to_path_buf())
        })?;
        Self::from_bytes(&xml)
    }

    pub fn from_bytes(xml: &[u8]) -> Result<Self> {
        parse(xml).map_err(Error::into_invalid_signature_file)
    }

    /// `signatureVersion` of the file, if declared.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn trigger_puids(&self) -> &[TriggerPuid] {
        &self.triggers
    }

    pub fn format_mappings(&self) -> &[FileFormatMapping] {
        &self.mappings
    }

    /// Distinct puids container signatures can identify, in file order.
    pub fn mapped_puids(&self) -> Vec<&str> {
        let mut puids: Vec<&str> = Vec::new();
        for mapping in &self.mappings {
            if !puids.contains(&mapping.puid.as_str()) {
                puids.push(&mapping.puid);
            }
        }
        puids
    }

    /// Build a resolver containing every trigger accepted by `include`.
    pub fn resolver<F>(&self, mut include: F) -> ContainerFormatResolver
    where
        F: FnMut(&ContainerFamily) -> bool,
    {
        let mut resolver = ContainerFormatResolver::new();
        for trigger in &self.triggers {
            if include(&trigger.family) {
                resolver.register_puid(trigger.puid.clone(), trigger.family.clone());
            } else {
                debug!(
                    "Ignoring trigger {} for container family {}",
                    trigger.puid, trigger.family
                );
            }
        }
        resolver
    }
}

fn parse(xml: &[u8]) -> Result<ContainerDefinitions> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut definitions = ContainerDefinitions::default();
    let mut seen_root = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if !seen_root {
                    if e.local_name().as_ref() != ROOT_ELEMENT.as_bytes() {
                        return Err(Error::InvalidSignatureFile(format!(
                            "expected <{}> root element, found <{}>",
                            ROOT_ELEMENT,
                            String::from_utf8_lossy(e.local_name().as_ref())
                        )));
                    }
                    seen_root = true;
                    definitions.version = attribute(e, "signatureVersion")?;
                } else {
                    read_entry(e, &mut definitions)?;
                }
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    if !seen_root {
        return Err(Error::InvalidSignatureFile(format!(
            "missing <{}> root element",
            ROOT_ELEMENT
        )));
    }
    debug!(
        "Loaded {} trigger puid(s) and {} format mapping(s)",
        definitions.triggers.len(),
        definitions.mappings.len()
    );
    Ok(definitions)
}

fn read_entry(e: &BytesStart<'_>, definitions: &mut ContainerDefinitions) -> Result<()> {
    match e.local_name().as_ref() {
        b"FileFormatMapping" => {
            let id = attribute(e, "signatureId")?.and_then(|v| v.trim().parse().ok());
            match (id, attribute(e, "Puid")?) {
                (Some(signature_id), Some(puid)) => {
                    definitions.mappings.push(FileFormatMapping { signature_id, puid })
                },
                _ => warn!("Skipping file format mapping without signatureId or Puid"),
            }
        },
        b"TriggerPuid" => match (attribute(e, "ContainerType")?, attribute(e, "Puid")?) {
            (Some(label), Some(puid)) => definitions.triggers.push(TriggerPuid {
                puid,
                family: ContainerFamily::from(label.as_str()),
            }),
            _ => warn!("Skipping trigger puid without ContainerType or Puid"),
        },
        _ => {},
    }
    Ok(())
}

/// Value of a non-empty attribute.
fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    Ok(attributes(e)?
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.trim().is_empty()))
}

/// A small container signature file used by tests across the crate.
#[cfg(test)]
pub(crate) const TEST_CONTAINER_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ContainerSignatureMapping schemaVersion="1.0" signatureVersion="20240715">
  <ContainerSignatures>
    <ContainerSignature Id="1000" ContainerType="ZIP">
      <Description>Microsoft Word OOXML</Description>
      <Files>
        <File><Path>word/document.xml</Path></File>
      </Files>
    </ContainerSignature>
  </ContainerSignatures>
  <FileFormatMappings>
    <FileFormatMapping signatureId="1000" Puid="fmt/412"/>
    <FileFormatMapping signatureId="1001" Puid="fmt/412"/>
    <FileFormatMapping signatureId="1002" Puid="fmt/40"/>
    <FileFormatMapping Puid="fmt/9999"/>
  </FileFormatMappings>
  <TriggerPuids>
    <TriggerPuid ContainerType="ZIP" Puid="x-fmt/263"/>
    <TriggerPuid ContainerType="OLE2" Puid="fmt/111"/>
    <TriggerPuid ContainerType="RAR" Puid="x-fmt/264"/>
    <TriggerPuid Puid="fmt/0"/>
  </TriggerPuids>
</ContainerSignatureMapping>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_triggers_and_mappings() {
        let definitions = ContainerDefinitions::from_bytes(TEST_CONTAINER_FILE.as_bytes()).unwrap();
        assert_eq!(definitions.version(), Some("20240715"));
        assert_eq!(definitions.trigger_puids().len(), 3);
        assert_eq!(definitions.trigger_puids()[0].family, ContainerFamily::Zip);
        assert_eq!(
            definitions.trigger_puids()[2].family,
            ContainerFamily::Other("RAR".to_string())
        );
        assert_eq!(definitions.format_mappings().len(), 3);
        assert_eq!(definitions.mapped_puids(), ["fmt/412", "fmt/40"]);
    }

    #[test]
    fn test_resolver_filters_families() {
        let definitions = ContainerDefinitions::from_bytes(TEST_CONTAINER_FILE.as_bytes()).unwrap();
        let resolver = definitions.resolver(|family| *family == ContainerFamily::Zip);
        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.for_puid("x-fmt/263"), Some(&ContainerFamily::Zip));
        assert_eq!(resolver.for_puid("fmt/111"), None);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("container.xml");
        assert!(matches!(
            ContainerDefinitions::load(&missing),
            Err(Error::FileNotFound(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<FFSignatureFile/>").unwrap();
        assert!(matches!(
            ContainerDefinitions::load(file.path()),
            Err(Error::InvalidSignatureFile(_))
        ));

        assert!(matches!(
            ContainerDefinitions::from_bytes(
                b"<ContainerSignatureMapping><TriggerPuids></FileFormatMappings></ContainerSignatureMapping>"
            ),
            Err(Error::InvalidSignatureFile(_))
        ));
    }
}
