//! Container escalation.
//!
//! Some binary identifications (a ZIP archive, an OLE2 compound document) are
//! only the outer shell of a more specific format. The trigger table in
//! [`ContainerFormatResolver`] says which puids escalate into which
//! [`ContainerFamily`], and the [`ContainerRegistry`] hands the request to the
//! [`ContainerIdentifier`] registered for that family.

pub mod definitions;
pub mod family;
pub mod registry;
pub mod resolver;

pub use definitions::{ContainerDefinitions, FileFormatMapping, TriggerPuid};
pub use family::ContainerFamily;
pub use registry::{ContainerIdentifier, ContainerRegistry};
pub use resolver::ContainerFormatResolver;
