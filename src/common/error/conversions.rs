//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from the errors
//! of the parsing crates to the unified Error type.

use super::types::Error;

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlError(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlError(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::XmlError(format!("Invalid UTF-8 in text content: {}", err))
    }
}

impl Error {
    /// Re-wrap a low-level XML failure as a structurally invalid definition
    /// document, keeping every other error as it is.
    pub(crate) fn into_invalid_signature_file(self) -> Self {
        match self {
            Error::XmlError(msg) => Error::InvalidSignatureFile(msg),
            other => other,
        }
    }
}
