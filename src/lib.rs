//! Solution Patcher: idempotent line patches for project and solution files
//!
//! Two engines share one line-oriented [`Document`] model:
//!
//! - [`PatchSet`]: ordered [`PatchRule`]s run in a single pass over a file.
//!   Either every rule is satisfied and the file is rewritten, or nothing is
//!   written at all.
//! - [`RegistryEditor`]: adds, removes and relinks project entries in a
//!   solution document, keeping the project block, the anchor's dependency
//!   section and the configuration lines consistent.
//!
//! Both stage their edits in [`StagedEdits`] keyed by original line index and
//! apply them once the scan is over.
//!
//! # Safety
//!
//! - Atomic file writes (tempfile + fsync + rename)
//! - Concurrent-modification check against the fingerprint taken at load
//! - Line endings, trailing newline and BOM preserved
//! - Workspace boundary enforcement for manifest targets
//!
//! # Example
//!
//! ```no_run
//! use solution_patcher::{apply_patches, PatchRule, PatchSet};
//!
//! let set = PatchSet::from_rules([PatchRule::line(
//!     "<StartProgram>",
//!     "<StartProgram>C:\\Game\\Game.exe</StartProgram>",
//! )]);
//!
//! match apply_patches("VSModLauncher.csproj.user", &set) {
//!     Ok(report) => println!("changed: {}", report.changed),
//!     Err(e) => eprintln!("patch failed: {}", e),
//! }
//! ```

pub mod config;
pub mod document;
pub mod ops;
pub mod patch;
pub mod registry;
pub mod safety;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, PatchManifest, ValidationError};
pub use document::{Document, DocumentError, StagedEdits};
pub use ops::{
    add_project_entry, apply_manifest, apply_patches, check_manifest, edit_registry, patch_file,
    relink_project_entry, remove_project_entry, FileChange, PatchResult, RegistryAction,
    RegistryOutcome, SurfaceError,
};
pub use patch::{PatchError, PatchReport, PatchRule, PatchSet, RuleFailure};
pub use registry::{
    AnchorProject, ProjectEntry, ProjectId, RegistryDocument, RegistryEditor, RegistryError,
};
pub use safety::{SafetyError, WorkspaceGuard};
