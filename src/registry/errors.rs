use crate::registry::editor::AddPhase;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("anchor project not found: {name} ({relative_path})")]
    AnchorNotFound { name: String, relative_path: String },

    #[error("solution has no ProjectConfigurationPlatforms global section")]
    GlobalSectionNotFound,

    #[error("malformed solution: reached end of document (line {line}) while {phase}")]
    MalformedDocument { phase: AddPhase, line: usize },

    #[error("project not found in solution: {name} ({relative_path})")]
    NotFound { name: String, relative_path: String },

    #[error("project already registered: {name} ({relative_path}) as {id}")]
    AlreadyRegistered {
        name: String,
        relative_path: String,
        id: String,
    },

    #[error("project {name} is the anchor project and cannot depend on itself")]
    AnchorIsTarget { name: String },
}
