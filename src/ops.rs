//! Load, mutate and save surfaces.
//!
//! Every operation reads one file into memory, runs a pure transformation and
//! writes the result back in a single atomic step. A failed transformation
//! leaves the file byte-identical. Files are independent: a failure on one
//! never rolls back another.

use crate::config::{PatchDefinition, PatchManifest};
use crate::document::{Document, DocumentError};
use crate::patch::{PatchError, PatchReport, PatchSet};
use crate::registry::{ProjectEntry, RegistryDocument, RegistryEditor, RegistryError};
use crate::safety::{SafetyError, WorkspaceGuard};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

/// Text of a file before and after an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub file: PathBuf,
    pub before: String,
    pub after: String,
}

impl FileChange {
    fn new(file: &Path, before: &Document, after: &Document) -> Self {
        Self {
            file: file.to_path_buf(),
            before: before.render(),
            after: after.render(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// Outcome of one manifest patch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult says whether the file was changed"]
pub enum PatchResult {
    /// The patch changed (or in a dry run, would change) the file
    Applied {
        change: FileChange,
        unmatched: Vec<String>,
    },
    /// Every rule ran and the file already had the patched content
    AlreadyApplied { file: PathBuf },
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied { change, .. } => {
                write!(f, "Applied patch to {}", change.file.display())
            }
            PatchResult::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
        }
    }
}

/// Run `set` against the file at `path`, writing only when every rule was
/// satisfied and something changed.
pub fn apply_patches(path: impl AsRef<Path>, set: &PatchSet) -> Result<PatchReport, SurfaceError> {
    let path = path.as_ref();
    let (_, report) = run_patch_set(path, set, false)?;
    Ok(report)
}

/// Like [`apply_patches`], also returning the before/after text.
pub fn patch_file(
    path: impl AsRef<Path>,
    set: &PatchSet,
    dry_run: bool,
) -> Result<PatchResult, SurfaceError> {
    let path = path.as_ref();
    let (change, report) = run_patch_set(path, set, dry_run)?;
    if report.changed {
        Ok(PatchResult::Applied {
            change,
            unmatched: report.unmatched,
        })
    } else {
        Ok(PatchResult::AlreadyApplied {
            file: path.to_path_buf(),
        })
    }
}

fn run_patch_set(
    path: &Path,
    set: &PatchSet,
    dry_run: bool,
) -> Result<(FileChange, PatchReport), SurfaceError> {
    let original = Document::load(path)?;
    let mut patched = original.clone();

    let report = match set.apply(&mut patched) {
        Ok(report) => report,
        Err(error) => {
            for failure in error.failures() {
                tracing::warn!(
                    file = %path.display(),
                    rule = %failure.rule,
                    line = failure.line.map(|line| line + 1),
                    text = failure.text.as_deref().map(str::trim),
                    reason = %failure.reason,
                    "patch rule not satisfied"
                );
            }
            return Err(error.into());
        }
    };

    for rule in &report.unmatched {
        tracing::debug!(file = %path.display(), rule = %rule, "patch rule matched nothing");
    }

    if report.changed && !dry_run {
        patched.save(path)?;
        tracing::info!(file = %path.display(), rules = set.len(), "patched file written");
    }

    Ok((FileChange::new(path, &original, &patched), report))
}

/// Apply every `[[patches]]` entry of `manifest`, each as its own file
/// operation.
pub fn apply_manifest(
    manifest: &PatchManifest,
    workspace_root: &Path,
    dry_run: bool,
) -> Vec<(String, Result<PatchResult, SurfaceError>)> {
    manifest
        .patches
        .iter()
        .map(|patch| {
            let result = resolve_target(manifest, patch, workspace_root)
                .and_then(|path| patch_file(path, &patch.patch_set(), dry_run));
            (patch.id.clone(), result)
        })
        .collect()
}

/// Read-only [`apply_manifest`]: `Applied` means the patch is still pending.
pub fn check_manifest(
    manifest: &PatchManifest,
    workspace_root: &Path,
) -> Vec<(String, Result<PatchResult, SurfaceError>)> {
    apply_manifest(manifest, workspace_root, true)
}

fn resolve_target(
    manifest: &PatchManifest,
    patch: &PatchDefinition,
    workspace_root: &Path,
) -> Result<PathBuf, SurfaceError> {
    if manifest.meta.workspace_relative {
        let guard = WorkspaceGuard::new(workspace_root)?;
        Ok(guard.validate_path(&patch.file)?)
    } else {
        Ok(PathBuf::from(&patch.file))
    }
}

/// Registry mutation requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryAction {
    Add,
    Remove,
    Relink,
}

impl fmt::Display for RegistryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryAction::Add => f.write_str("add"),
            RegistryAction::Remove => f.write_str("remove"),
            RegistryAction::Relink => f.write_str("relink"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOutcome {
    pub entry: ProjectEntry,
    pub change: FileChange,
}

pub fn add_project_entry(
    registry_path: impl AsRef<Path>,
    editor: &RegistryEditor,
    name: &str,
    relative_path: &str,
) -> Result<ProjectEntry, SurfaceError> {
    edit_registry(registry_path, editor, RegistryAction::Add, name, relative_path, false)
        .map(|outcome| outcome.entry)
}

pub fn remove_project_entry(
    registry_path: impl AsRef<Path>,
    editor: &RegistryEditor,
    name: &str,
    relative_path: &str,
) -> Result<ProjectEntry, SurfaceError> {
    edit_registry(registry_path, editor, RegistryAction::Remove, name, relative_path, false)
        .map(|outcome| outcome.entry)
}

pub fn relink_project_entry(
    registry_path: impl AsRef<Path>,
    editor: &RegistryEditor,
    name: &str,
    relative_path: &str,
) -> Result<ProjectEntry, SurfaceError> {
    edit_registry(registry_path, editor, RegistryAction::Relink, name, relative_path, false)
        .map(|outcome| outcome.entry)
}

/// Load the solution, run `action`, and save unless `dry_run`.
pub fn edit_registry(
    registry_path: impl AsRef<Path>,
    editor: &RegistryEditor,
    action: RegistryAction,
    name: &str,
    relative_path: &str,
    dry_run: bool,
) -> Result<RegistryOutcome, SurfaceError> {
    let path = registry_path.as_ref();
    let original = RegistryDocument::load(path)?;
    let mut document = original.clone();

    let entry = match action {
        RegistryAction::Add => editor.add(&mut document, name, relative_path)?,
        RegistryAction::Remove => editor.remove(&mut document, name, relative_path)?,
        RegistryAction::Relink => editor.relink(&mut document, name, relative_path)?,
    };

    let change = FileChange::new(path, original.document(), document.document());
    if !dry_run && !change.is_noop() {
        document.save(path)?;
        tracing::info!(
            file = %path.display(),
            %action,
            name,
            relative_path,
            id = %entry.id,
            "solution written"
        );
    }

    Ok(RegistryOutcome { entry, change })
}
