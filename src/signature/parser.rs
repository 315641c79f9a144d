//! Signature file loader.
//!
//! Streams an `FFSignatureFile` document with quick-xml into a
//! [`SignatureSetBuilder`]. The document is structurally validated (well-formed
//! XML with the expected root) but individual entries are treated leniently:
//! a malformed format or signature is skipped with a warning and the rest of
//! the catalogue still loads.

use std::path::Path;

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};

use super::format::FileFormat;
use super::internal::InternalSignatureDef;
use super::sequence::{ByteSequenceDef, SubSequenceDef};
use super::set::SignatureSetBuilder;
use crate::common::error::{Error, Result};

const ROOT_ELEMENT: &str = "FFSignatureFile";

/// Load a signature file from disk.
///
/// A missing or unreadable file is reported as [`Error::FileNotFound`]; any
/// structural problem with its content as [`Error::InvalidSignatureFile`].
pub fn load_catalogue<P: AsRef<Path>>(path: P) -> Result<SignatureSetBuilder> {
    let path = path.as_ref();
    let xml = std::fs::read(path).map_err(|e| {
        debug!("Cannot read signature file {}: {}", path.display(), e);
        Error::FileNotFound(path.to_path_buf())
    })?;
    parse_signature_file(&xml)
}

/// Parse signature file content already held in memory.
pub fn parse_signature_file(xml: &[u8]) -> Result<SignatureSetBuilder> {
    SignatureFileParser::default()
        .parse(xml)
        .map_err(Error::into_invalid_signature_file)
}

/// Read every attribute of an element as owned `(name, value)` pairs.
pub(crate) fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        out.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.to_string(),
        ));
    }
    Ok(out)
}

/// Namespace declarations and qualified schema attributes are not data.
pub(crate) fn is_namespace_attribute(name: &str) -> bool {
    name.starts_with("xmlns") || name.contains(':')
}

fn unknown_attribute(element: &str, name: &str) {
    if !is_namespace_attribute(name) {
        warn!("Unknown attribute '{}' on element <{}>", name, element);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Sequence,
    SignatureId,
    Extension,
    PriorityOver,
}

#[derive(Debug)]
struct SignatureEntry {
    def: InternalSignatureDef,
    valid: bool,
}

#[derive(Debug)]
struct FormatEntry {
    format: FileFormat,
    valid: bool,
}

#[derive(Debug, Default)]
struct SignatureFileParser {
    builder: SignatureSetBuilder,
    seen_root: bool,
    signature: Option<SignatureEntry>,
    sequence: Option<ByteSequenceDef>,
    subsequence: Option<SubSequenceDef>,
    format: Option<FormatEntry>,
    text_field: Option<TextField>,
    text: String,
}

impl SignatureFileParser {
    fn parse(mut self, xml: &[u8]) -> Result<SignatureSetBuilder> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => self.start(e)?,
                Event::Empty(ref e) => {
                    self.start(e)?;
                    self.end(e.local_name().as_ref());
                },
                Event::End(ref e) => self.end(e.local_name().as_ref()),
                Event::Text(ref e) => {
                    if self.text_field.is_some() {
                        self.text.push_str(std::str::from_utf8(e.as_ref())?);
                    }
                },
                Event::GeneralRef(ref e) => {
                    if self.text_field.is_some() {
                        self.push_reference(e)?;
                    }
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        if !self.seen_root {
            return Err(Error::InvalidSignatureFile(format!(
                "missing <{}> root element",
                ROOT_ELEMENT
            )));
        }
        Ok(self.builder)
    }

    /// Character and predefined entity references inside element text.
    fn push_reference(&mut self, reference: &BytesRef<'_>) -> Result<()> {
        if let Some(ch) = reference.resolve_char_ref()? {
            self.text.push(ch);
            return Ok(());
        }
        let name = std::str::from_utf8(reference.as_ref())?;
        match resolve_predefined_entity(name) {
            Some(value) => self.text.push_str(value),
            None => warn!("Ignoring unknown entity reference &{};", name),
        }
        Ok(())
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let local = e.local_name();
        let name = local.as_ref();
        if !self.seen_root {
            if name != ROOT_ELEMENT.as_bytes() {
                return Err(Error::InvalidSignatureFile(format!(
                    "expected <{}> root element, found <{}>",
                    ROOT_ELEMENT,
                    String::from_utf8_lossy(name)
                )));
            }
            self.seen_root = true;
            for (key, value) in attributes(e)? {
                match key.as_str() {
                    "Version" => self.builder.set_version(value),
                    "DateCreated" => self.builder.set_date_created(value),
                    _ => unknown_attribute(ROOT_ELEMENT, &key),
                }
            }
            return Ok(());
        }

        match name {
            b"InternalSignature" => self.start_signature(e)?,
            b"ByteSequence" => {
                let mut def = ByteSequenceDef::default();
                let mut indirect = false;
                for (key, value) in attributes(e)? {
                    match key.as_str() {
                        "Reference" => def.reference = value,
                        "IndirectOffsetLocation" | "IndirectOffsetLength" => indirect = true,
                        "Endianness" => {},
                        _ => unknown_attribute("ByteSequence", &key),
                    }
                }
                if indirect && !def.reference.starts_with("Indirect") {
                    def.reference = format!("Indirect{}", def.reference);
                }
                self.sequence = Some(def);
            },
            b"SubSequence" => self.start_subsequence(e)?,
            b"Sequence" => self.capture(TextField::Sequence),
            b"LeftFragment" | b"RightFragment" => {
                if let Some(sub) = self.subsequence.as_mut() {
                    sub.has_side_fragments = true;
                }
            },
            b"FileFormat" => self.start_format(e)?,
            b"InternalSignatureID" => self.capture(TextField::SignatureId),
            b"Extension" => self.capture(TextField::Extension),
            b"HasPriorityOverFileFormatID" => self.capture(TextField::PriorityOver),
            _ => {},
        }
        Ok(())
    }

    fn capture(&mut self, field: TextField) {
        self.text.clear();
        self.text_field = Some(field);
    }

    fn start_signature(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let mut entry = SignatureEntry {
            def: InternalSignatureDef::default(),
            valid: false,
        };
        for (key, value) in attributes(e)? {
            match key.as_str() {
                "ID" => match value.trim().parse() {
                    Ok(id) => {
                        entry.def.id = id;
                        entry.valid = true;
                    },
                    Err(_) => warn!("Skipping internal signature with invalid ID '{}'", value),
                },
                "Specificity" => entry.def.specific = value.trim().eq_ignore_ascii_case("specific"),
                _ => unknown_attribute("InternalSignature", &key),
            }
        }
        self.signature = Some(entry);
        Ok(())
    }

    fn start_subsequence(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let mut def = SubSequenceDef::default();
        let mut bad = None;
        for (key, value) in attributes(e)? {
            let value = value.trim();
            match key.as_str() {
                "Position" => match value.parse() {
                    Ok(p) => def.position = p,
                    Err(_) => bad = Some(key),
                },
                "SubSeqMinOffset" => match value.parse() {
                    Ok(v) => def.min_offset = v,
                    Err(_) => bad = Some(key),
                },
                "SubSeqMaxOffset" if value.is_empty() => def.max_offset = None,
                "SubSeqMaxOffset" => match value.parse() {
                    Ok(v) => def.max_offset = Some(v),
                    Err(_) => bad = Some(key),
                },
                "MinFragLength" => {},
                _ => unknown_attribute("SubSequence", &key),
            }
        }
        if let Some(key) = bad
            && let Some(entry) = self.signature.as_mut()
        {
            warn!(
                "Skipping internal signature [id:{}]: invalid {} on sub-sequence",
                entry.def.id, key
            );
            entry.valid = false;
        }
        self.subsequence = Some(def);
        Ok(())
    }

    fn start_format(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let mut id = None;
        let mut puid = None;
        let mut format = FileFormat::default();
        for (key, value) in attributes(e)? {
            match key.as_str() {
                "ID" => id = value.trim().parse::<i32>().ok(),
                "PUID" => puid = Some(value).filter(|p| !p.trim().is_empty()),
                "Name" => format.set_name(value),
                "Version" => format.set_version(value),
                "MIMEType" => format.set_mime_type(value),
                _ => unknown_attribute("FileFormat", &key),
            }
        }

        let valid = id.is_some() && puid.is_some();
        if !valid {
            warn!(
                "Skipping file format '{}': missing or invalid ID or PUID",
                format.name()
            );
        }
        format.set_identity(id.unwrap_or_default(), puid.unwrap_or_default());
        self.format = Some(FormatEntry { format, valid });
        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"Sequence" => {
                if let Some(sub) = self.subsequence.as_mut() {
                    sub.sequence = std::mem::take(&mut self.text);
                }
            },
            b"SubSequence" => {
                if let (Some(sub), Some(sequence)) = (self.subsequence.take(), self.sequence.as_mut())
                {
                    sequence.subsequences.push(sub);
                }
            },
            b"ByteSequence" => {
                if let (Some(sequence), Some(entry)) = (self.sequence.take(), self.signature.as_mut())
                {
                    entry.def.sequences.push(sequence);
                }
            },
            b"InternalSignature" => {
                if let Some(entry) = self.signature.take()
                    && entry.valid
                {
                    self.builder.add_signature_def(entry.def);
                }
            },
            b"InternalSignatureID" | b"HasPriorityOverFileFormatID" | b"Extension" => {
                self.end_format_child();
            },
            b"FileFormat" => {
                if let Some(entry) = self.format.take() {
                    self.finish_format(entry);
                }
            },
            _ => {},
        }
        if matches!(
            name,
            b"Sequence" | b"InternalSignatureID" | b"HasPriorityOverFileFormatID" | b"Extension"
        ) {
            self.text_field = None;
            self.text.clear();
        }
    }

    fn end_format_child(&mut self) {
        let (Some(field), Some(entry)) = (self.text_field, self.format.as_mut()) else {
            return;
        };
        let text = self.text.trim();
        match field {
            TextField::Extension => {
                if !text.is_empty() {
                    entry.format.add_extension(text);
                }
            },
            TextField::SignatureId | TextField::PriorityOver => match text.parse::<i32>() {
                Ok(value) if field == TextField::SignatureId => {
                    entry.format.add_internal_signature(value)
                },
                Ok(value) => entry.format.add_priority_over(value),
                Err(_) => {
                    warn!(
                        "Skipping file format {}: invalid id reference '{}'",
                        entry.format.puid(),
                        text
                    );
                    entry.valid = false;
                },
            },
            TextField::Sequence => {},
        }
    }

    fn finish_format(&mut self, entry: FormatEntry) {
        if !entry.valid {
            return;
        }
        if self.builder.catalogue().format_for_puid(entry.format.puid()).is_some() {
            warn!(
                "Skipping file format [id:{}]: duplicate PUID {}",
                entry.format.id(),
                entry.format.puid()
            );
            return;
        }
        self.builder.add_format(entry.format);
    }
}

/// A small signature file used by tests across the crate.
#[cfg(test)]
pub(crate) const TEST_SIGNATURE_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FFSignatureFile xmlns="http://www.nationalarchives.gov.uk/pronom/SignatureFile" Version="120" DateCreated="2024-09-01T00:00:00">
  <InternalSignatureCollection>
    <InternalSignature ID="1" Specificity="Generic">
      <ByteSequence Reference="BOFoffset">
        <SubSequence Position="1" SubSeqMinOffset="0" SubSeqMaxOffset="0">
          <Sequence>504B0304</Sequence>
          <DefaultShift>5</DefaultShift>
          <Shift Byte="04">1</Shift>
        </SubSequence>
      </ByteSequence>
    </InternalSignature>
    <InternalSignature ID="2" Specificity="Generic">
      <ByteSequence Reference="BOFoffset">
        <SubSequence Position="1" SubSeqMinOffset="0" SubSeqMaxOffset="0">
          <Sequence>D0CF11E0A1B11AE1</Sequence>
        </SubSequence>
      </ByteSequence>
    </InternalSignature>
    <InternalSignature ID="3" Specificity="Generic">
      <ByteSequence Reference="BOFoffset">
        <SubSequence Position="1" SubSeqMinOffset="0" SubSeqMaxOffset="0">
          <Sequence>255044462D</Sequence>
        </SubSequence>
      </ByteSequence>
    </InternalSignature>
    <InternalSignature ID="4" Specificity="Specific">
      <ByteSequence Reference="BOFoffset">
        <SubSequence Position="1" SubSeqMinOffset="0" SubSeqMaxOffset="0">
          <Sequence>255044462D312E34</Sequence>
        </SubSequence>
      </ByteSequence>
      <ByteSequence Reference="EOFoffset">
        <SubSequence Position="1" SubSeqMinOffset="0" SubSeqMaxOffset="8">
          <Sequence>2525454F46</Sequence>
        </SubSequence>
      </ByteSequence>
    </InternalSignature>
    <InternalSignature ID="5" Specificity="Specific">
      <ByteSequence Reference="BOFoffset">
        <SubSequence Position="1" SubSeqMinOffset="0" SubSeqMaxOffset="0">
          <Sequence>4142</Sequence>
          <LeftFragment Position="1" MinOffset="0" MaxOffset="0">43</LeftFragment>
        </SubSequence>
      </ByteSequence>
    </InternalSignature>
  </InternalSignatureCollection>
  <FileFormatCollection>
    <FileFormat ID="1" Name="ZIP Format" PUID="x-fmt/263" Version="2.0" MIMEType="application/zip">
      <InternalSignatureID>1</InternalSignatureID>
      <Extension>zip</Extension>
    </FileFormat>
    <FileFormat ID="2" Name="OLE2 Compound Document Format" PUID="fmt/111" Version="">
      <InternalSignatureID>2</InternalSignatureID>
    </FileFormat>
    <FileFormat ID="3" Name="Acrobat PDF - Portable Document Format" PUID="fmt/14" Version="1.0" MIMEType="application/pdf">
      <InternalSignatureID>3</InternalSignatureID>
      <Extension>pdf</Extension>
    </FileFormat>
    <FileFormat ID="4" Name="Acrobat PDF 1.4 - Portable Document Format" PUID="fmt/18" Version="1.4" MIMEType="application/pdf">
      <InternalSignatureID>4</InternalSignatureID>
      <Extension>pdf</Extension>
      <HasPriorityOverFileFormatID>3</HasPriorityOverFileFormatID>
    </FileFormat>
    <FileFormat ID="5" Name="Plain Text File" PUID="x-fmt/111" Colour="blue">
      <Extension>txt</Extension>
      <Extension>TEXT</Extension>
    </FileFormat>
    <FileFormat ID="6" Name="Microsoft Word for Windows" PUID="fmt/412" Version="2007 onwards">
      <Extension>docx</Extension>
    </FileFormat>
    <FileFormat ID="7" Name="Fragmented Format" PUID="fmt/999">
      <InternalSignatureID>5</InternalSignatureID>
      <Extension>frg</Extension>
    </FileFormat>
    <FileFormat ID="oops" Name="Broken Format" PUID="fmt/1000"/>
    <FileFormat ID="8" Name="Duplicate Text" PUID="x-fmt/111">
      <Extension>dup</Extension>
    </FileFormat>
    <FileFormat ID="9" Name="Bad Priority" PUID="fmt/1001">
      <HasPriorityOverFileFormatID>three</HasPriorityOverFileFormatID>
    </FileFormat>
  </FileFormatCollection>
</FFSignatureFile>
"#;
