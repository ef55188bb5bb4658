//! Project registration in solution documents.
//!
//! Adding a project touches four regions of the file: the anchor project's
//! dependency sub-section, a new project block after the anchor, and the
//! configuration lines in the global `ProjectConfigurationPlatforms` section.
//! All of it happens in one forward scan driven by [`AddPhase`]; edits are
//! staged and applied only once the scan reaches [`AddPhase::Complete`].

use crate::document::StagedEdits;
use crate::registry::document::{
    is_configuration_header, is_dependencies_header, is_end_global_section, is_end_project,
    is_end_project_section, rewrite_declaration, ProjectBlock, ProjectDeclaration,
    RegistryDocument, DEPENDENCIES_HEADER, END_PROJECT, END_PROJECT_SECTION,
};
use crate::registry::entry::{IdSource, ProjectEntry, ProjectId, UuidSource};
use crate::registry::errors::RegistryError;
use std::fmt;

/// C# project type used for new declarations unless configured otherwise.
pub const DEFAULT_PROJECT_TYPE: &str = "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}";

/// SDK-style C# project type that relink converts back to the configured type.
pub const LEGACY_SDK_PROJECT_TYPE: &str = "{9A19103F-16F7-4668-BE54-9A1E7A4F7556}";

pub fn default_legacy_project_types() -> Vec<String> {
    vec![LEGACY_SDK_PROJECT_TYPE.to_string()]
}

/// Existing project that every registered project becomes a dependency of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorProject {
    pub name: String,
    pub relative_path: String,
}

impl AnchorProject {
    pub fn new(name: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// Solution configuration and the project configuration it builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationMapping {
    pub solution: String,
    pub project: String,
}

impl ConfigurationMapping {
    pub fn new(solution: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            solution: solution.into(),
            project: project.into(),
        }
    }
}

/// Debug, Release x64 and Release, all on Any CPU.
pub fn default_configurations() -> Vec<ConfigurationMapping> {
    vec![
        ConfigurationMapping::new("Debug|Any CPU", "Debug|Any CPU"),
        ConfigurationMapping::new("Release x64|Any CPU", "Release|Any CPU"),
        ConfigurationMapping::new("Release|Any CPU", "Release|Any CPU"),
    ]
}

/// Position of the insertion scan. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPhase {
    SeekAnchor,
    SeekDependencies,
    SeekBlockEnd,
    SeekGlobalSection,
    SeekGlobalSectionEnd,
    Complete,
}

impl fmt::Display for AddPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AddPhase::SeekAnchor => "looking for the anchor project",
            AddPhase::SeekDependencies => "looking for the anchor's dependency section",
            AddPhase::SeekBlockEnd => "looking for the end of the anchor project",
            AddPhase::SeekGlobalSection => "looking for the project configuration section",
            AddPhase::SeekGlobalSectionEnd => "looking for EndGlobalSection",
            AddPhase::Complete => "complete",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEditor {
    anchor: AnchorProject,
    project_type: String,
    legacy_project_types: Vec<String>,
    configurations: Vec<ConfigurationMapping>,
}

impl RegistryEditor {
    pub fn new(anchor: AnchorProject) -> Self {
        Self {
            anchor,
            project_type: DEFAULT_PROJECT_TYPE.to_string(),
            legacy_project_types: default_legacy_project_types(),
            configurations: default_configurations(),
        }
    }

    pub fn with_project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = project_type.into();
        self
    }

    /// Project types that relink rewrites to the configured type; any other
    /// type is left as it is.
    pub fn with_legacy_project_types(mut self, legacy: Vec<String>) -> Self {
        self.legacy_project_types = legacy;
        self
    }

    pub fn with_configurations(mut self, configurations: Vec<ConfigurationMapping>) -> Self {
        self.configurations = configurations;
        self
    }

    pub fn anchor(&self) -> &AnchorProject {
        &self.anchor
    }

    pub fn project_type(&self) -> &str {
        &self.project_type
    }

    /// Register a new project under a freshly generated id.
    pub fn add(
        &self,
        document: &mut RegistryDocument,
        name: &str,
        relative_path: &str,
    ) -> Result<ProjectEntry, RegistryError> {
        self.add_with(document, name, relative_path, &mut UuidSource)
    }

    /// Register a new project, drawing its id from `ids`.
    pub fn add_with(
        &self,
        document: &mut RegistryDocument,
        name: &str,
        relative_path: &str,
        ids: &mut dyn IdSource,
    ) -> Result<ProjectEntry, RegistryError> {
        if let Some(existing) = document.find_project_block(name, relative_path) {
            return Err(RegistryError::AlreadyRegistered {
                name: name.to_string(),
                relative_path: relative_path.to_string(),
                id: existing.id().to_string(),
            });
        }

        let entry = ProjectEntry {
            id: ids.next_id(),
            name: name.to_string(),
            relative_path: relative_path.to_string(),
        };

        let lines = document.lines();
        let mut insertion = Insertion::new(self, &entry);
        let mut index = 0;
        while index < lines.len() && insertion.phase != AddPhase::Complete {
            match insertion.step(index, &lines[index]) {
                Step::Advance => index += 1,
                Step::Reexamine => {}
            }
        }

        if insertion.phase != AddPhase::Complete {
            return Err(insertion.failure(lines.len()));
        }

        document.apply(insertion.staged);
        tracing::debug!(name, relative_path, id = %entry.id, "project registered");
        Ok(entry)
    }

    /// Remove a project block and every line that references its id.
    pub fn remove(
        &self,
        document: &mut RegistryDocument,
        name: &str,
        relative_path: &str,
    ) -> Result<ProjectEntry, RegistryError> {
        let block = document
            .find_project_block(name, relative_path)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                relative_path: relative_path.to_string(),
            })?;

        let mut staged = StagedEdits::new();
        staged.delete_range(block.lines());
        sweep_references(document, &block, &mut staged);
        document.apply(staged);

        tracing::debug!(name, relative_path, id = %block.id(), "project removed");
        Ok(block.entry())
    }

    /// Re-attach an existing project to the anchor.
    ///
    /// Drops the project's own dependency section, converts a legacy project
    /// type to the configured one, and makes sure the anchor's dependency
    /// section lists it.
    pub fn relink(
        &self,
        document: &mut RegistryDocument,
        name: &str,
        relative_path: &str,
    ) -> Result<ProjectEntry, RegistryError> {
        let block = document
            .find_project_block(name, relative_path)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                relative_path: relative_path.to_string(),
            })?;
        let anchor = document
            .find_project_block(&self.anchor.name, &self.anchor.relative_path)
            .ok_or_else(|| self.anchor_not_found())?;
        if anchor.start == block.start {
            return Err(RegistryError::AnchorIsTarget {
                name: name.to_string(),
            });
        }

        let id = block.id().clone();
        let mut staged = StagedEdits::new();

        if self.is_legacy_type(&block.declaration.project_type) {
            let mut declaration = block.declaration.clone();
            declaration.project_type = self.project_type.clone();
            let original = &document.lines()[block.start];
            staged.replace(block.start, rewrite_declaration(original, &declaration));
        }

        if let Some(section) = block.dependencies {
            staged.delete_range(section.lines());
        }

        match anchor.dependencies {
            Some(section) => {
                let lines = document.lines();
                let listed = section
                    .body()
                    .any(|index| id.is_referenced_by(&lines[index]));
                if !listed {
                    staged.insert_before(section.end, [self.dependency_line(&id)]);
                }
            }
            None => staged.insert_before(anchor.end, self.dependency_section(&id)),
        }

        document.apply(staged);
        tracing::debug!(name, relative_path, id = %id, "project relinked");
        Ok(block.entry())
    }

    fn is_legacy_type(&self, project_type: &str) -> bool {
        !project_type.eq_ignore_ascii_case(&self.project_type)
            && self
                .legacy_project_types
                .iter()
                .any(|legacy| legacy.eq_ignore_ascii_case(project_type))
    }

    fn anchor_not_found(&self) -> RegistryError {
        RegistryError::AnchorNotFound {
            name: self.anchor.name.clone(),
            relative_path: self.anchor.relative_path.clone(),
        }
    }

    fn dependency_line(&self, id: &ProjectId) -> String {
        format!("\t\t{id} = {id}")
    }

    fn dependency_section(&self, id: &ProjectId) -> [String; 3] {
        [
            format!("\t{DEPENDENCIES_HEADER}"),
            self.dependency_line(id),
            format!("\t{END_PROJECT_SECTION}"),
        ]
    }

    fn declaration(&self, entry: &ProjectEntry) -> ProjectDeclaration {
        ProjectDeclaration {
            project_type: self.project_type.clone(),
            name: entry.name.clone(),
            relative_path: entry.relative_path.clone(),
            id: entry.id.clone(),
        }
    }

    fn configuration_lines(&self, id: &ProjectId) -> Vec<String> {
        self.configurations
            .iter()
            .flat_map(|mapping| {
                [
                    format!("\t\t{id}.{}.ActiveCfg = {}", mapping.solution, mapping.project),
                    format!("\t\t{id}.{}.Build.0 = {}", mapping.solution, mapping.project),
                ]
            })
            .collect()
    }
}

/// Stage deletion of every line outside `block` that references its id.
///
/// A dependency section emptied by the sweep goes too; sections that were
/// already empty are left alone.
fn sweep_references(document: &RegistryDocument, block: &ProjectBlock, staged: &mut StagedEdits) {
    struct OpenSection {
        header: usize,
        entries: usize,
        removed: usize,
    }

    let id = block.id();
    let mut open: Option<OpenSection> = None;

    for (index, line) in document.lines().iter().enumerate() {
        if block.lines().contains(&index) {
            continue;
        }
        if is_dependencies_header(line) {
            open = Some(OpenSection {
                header: index,
                entries: 0,
                removed: 0,
            });
            continue;
        }
        if is_end_project_section(line) || is_end_project(line) {
            if let Some(section) = open.take() {
                if is_end_project_section(line)
                    && section.entries > 0
                    && section.entries == section.removed
                {
                    staged.delete(section.header);
                    staged.delete(index);
                }
            }
            continue;
        }

        if let Some(section) = open.as_mut() {
            section.entries += 1;
        }
        if id.is_referenced_by(line) {
            staged.delete(index);
            if let Some(section) = open.as_mut() {
                section.removed += 1;
            }
        }
    }
}

enum Step {
    Advance,
    Reexamine,
}

/// Insertion scan state: the current phase plus everything staged so far.
struct Insertion<'a> {
    editor: &'a RegistryEditor,
    entry: &'a ProjectEntry,
    phase: AddPhase,
    staged: StagedEdits,
}

impl<'a> Insertion<'a> {
    fn new(editor: &'a RegistryEditor, entry: &'a ProjectEntry) -> Self {
        Self {
            editor,
            entry,
            phase: AddPhase::SeekAnchor,
            staged: StagedEdits::new(),
        }
    }

    fn step(&mut self, index: usize, line: &str) -> Step {
        match self.phase {
            AddPhase::SeekAnchor => self.seek_anchor(line),
            AddPhase::SeekDependencies => self.seek_dependencies(index, line),
            AddPhase::SeekBlockEnd => self.seek_block_end(index, line),
            AddPhase::SeekGlobalSection => self.seek_global_section(line),
            AddPhase::SeekGlobalSectionEnd => self.seek_global_section_end(index, line),
            AddPhase::Complete => Step::Advance,
        }
    }

    fn enter(&mut self, next: AddPhase) {
        tracing::debug!(from = %self.phase, to = %next, "registry scan phase");
        self.phase = next;
    }

    fn seek_anchor(&mut self, line: &str) -> Step {
        let anchor = self.editor.anchor();
        let is_anchor = ProjectDeclaration::parse(line)
            .is_some_and(|decl| decl.is(&anchor.name, &anchor.relative_path));
        if is_anchor {
            self.enter(AddPhase::SeekDependencies);
        }
        Step::Advance
    }

    fn seek_dependencies(&mut self, index: usize, line: &str) -> Step {
        if is_dependencies_header(line) {
            let dependency = self.editor.dependency_line(&self.entry.id);
            self.staged.insert_after(index, [dependency]);
            self.enter(AddPhase::SeekBlockEnd);
            return Step::Advance;
        }
        if is_end_project(line) {
            // No dependency section yet: open one just before EndProject, then
            // let the next phase see this same EndProject.
            let section = self.editor.dependency_section(&self.entry.id);
            self.staged.insert_before(index, section);
            self.enter(AddPhase::SeekBlockEnd);
            return Step::Reexamine;
        }
        Step::Advance
    }

    fn seek_block_end(&mut self, index: usize, line: &str) -> Step {
        if is_end_project(line) {
            let declaration = self.editor.declaration(self.entry).render();
            self.staged
                .insert_after(index, [declaration, END_PROJECT.to_string()]);
            self.enter(AddPhase::SeekGlobalSection);
        }
        Step::Advance
    }

    fn seek_global_section(&mut self, line: &str) -> Step {
        if is_configuration_header(line) {
            self.enter(AddPhase::SeekGlobalSectionEnd);
        }
        Step::Advance
    }

    fn seek_global_section_end(&mut self, index: usize, line: &str) -> Step {
        if is_end_global_section(line) {
            let configurations = self.editor.configuration_lines(&self.entry.id);
            self.staged.insert_before(index, configurations);
            self.enter(AddPhase::Complete);
        }
        Step::Advance
    }

    fn failure(&self, line: usize) -> RegistryError {
        match self.phase {
            AddPhase::SeekAnchor => self.editor.anchor_not_found(),
            AddPhase::SeekGlobalSection => RegistryError::GlobalSectionNotFound,
            phase => RegistryError::MalformedDocument { phase, line },
        }
    }
}
