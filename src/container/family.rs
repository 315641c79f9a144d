//! Container family labels.

use std::fmt;
use std::str::FromStr;

use phf::phf_map;
use serde::Serialize;

/// The kind of container a trigger format escalates into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ContainerFamily {
    Zip,
    Ole2,
    Gzip,
    /// Any label without a dedicated variant, kept verbatim.
    Other(String),
}

static KNOWN_FAMILIES: phf::Map<&'static str, ContainerFamily> = phf_map! {
    "ZIP" => ContainerFamily::Zip,
    "OLE2" => ContainerFamily::Ole2,
    "GZIP" => ContainerFamily::Gzip,
};

impl ContainerFamily {
    /// Label as written in container signature files.
    pub fn label(&self) -> &str {
        match self {
            ContainerFamily::Zip => "ZIP",
            ContainerFamily::Ole2 => "OLE2",
            ContainerFamily::Gzip => "GZIP",
            ContainerFamily::Other(label) => label,
        }
    }
}

impl FromStr for ContainerFamily {
    type Err = std::convert::Infallible;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let label = label.trim();
        Ok(KNOWN_FAMILIES
            .get(label)
            .cloned()
            .unwrap_or_else(|| ContainerFamily::Other(label.to_string())))
    }
}

impl From<&str> for ContainerFamily {
    fn from(label: &str) -> Self {
        match label.parse() {
            Ok(family) => family,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for ContainerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
