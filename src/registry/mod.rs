pub mod document;
pub mod editor;
pub mod entry;
pub mod errors;

pub use document::{ProjectBlock, ProjectDeclaration, RegistryDocument, Section};
pub use editor::{
    default_configurations, default_legacy_project_types, AddPhase, AnchorProject,
    ConfigurationMapping, RegistryEditor, DEFAULT_PROJECT_TYPE, LEGACY_SDK_PROJECT_TYPE,
};
pub use entry::{IdSource, ProjectEntry, ProjectId, UuidSource};
pub use errors::RegistryError;
