//! Structural view of a solution document.
//!
//! The model only recognizes what the editor needs: project declarations and
//! their `EndProject`, the `ProjectDependencies` sub-section of a block, and
//! the global `ProjectConfigurationPlatforms` section. Everything else is
//! carried through untouched.

use crate::document::{Document, DocumentError, StagedEdits};
use crate::patch::rule::{leading_whitespace, starts_with_ignore_case};
use crate::registry::entry::{ProjectEntry, ProjectId};
use std::ops::RangeInclusive;
use std::path::Path;

pub const DEPENDENCIES_HEADER: &str = "ProjectSection(ProjectDependencies) = postProject";
pub const END_PROJECT_SECTION: &str = "EndProjectSection";
pub const END_PROJECT: &str = "EndProject";
pub const CONFIGURATION_HEADER: &str =
    "GlobalSection(ProjectConfigurationPlatforms) = postSolution";
pub const END_GLOBAL_SECTION: &str = "EndGlobalSection";

/// `Project("{type}") = "name", "path", "{id}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDeclaration {
    pub project_type: String,
    pub name: String,
    pub relative_path: String,
    pub id: ProjectId,
}

impl ProjectDeclaration {
    pub fn parse(line: &str) -> Option<Self> {
        if !starts_with_ignore_case(line, "Project(") {
            return None;
        }
        let parts: Vec<&str> = line.split('"').collect();
        if parts.len() < 8 {
            return None;
        }
        Some(Self {
            project_type: parts[1].to_string(),
            name: parts[3].to_string(),
            relative_path: parts[5].to_string(),
            id: ProjectId::parse(parts[7])?,
        })
    }

    pub fn render(&self) -> String {
        format!(
            "Project(\"{}\") = \"{}\", \"{}\", \"{}\"",
            self.project_type, self.name, self.relative_path, self.id
        )
    }

    pub fn is(&self, name: &str, relative_path: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            && self.relative_path.eq_ignore_ascii_case(relative_path)
    }
}

/// Header and closing line of a section, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub start: usize,
    pub end: usize,
}

impl Section {
    pub fn lines(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    /// Lines strictly between header and closing line.
    pub fn body(&self) -> std::ops::Range<usize> {
        self.start + 1..self.end
    }
}

/// One `Project(...)` … `EndProject` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBlock {
    pub declaration: ProjectDeclaration,
    pub start: usize,
    pub end: usize,
    pub dependencies: Option<Section>,
}

impl ProjectBlock {
    pub fn id(&self) -> &ProjectId {
        &self.declaration.id
    }

    pub fn lines(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    pub fn entry(&self) -> ProjectEntry {
        ProjectEntry {
            id: self.id().clone(),
            name: self.declaration.name.clone(),
            relative_path: self.declaration.relative_path.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryDocument {
    document: Document,
}

impl RegistryDocument {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    pub fn parse(text: &str) -> Self {
        Self::new(Document::parse(text))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        Document::load(path).map(Self::new)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        self.document.save(path)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn lines(&self) -> &[String] {
        self.document.lines()
    }

    pub fn render(&self) -> String {
        self.document.render()
    }

    /// Every well-formed project block in document order.
    pub fn projects(&self) -> Vec<ProjectBlock> {
        let mut blocks = Vec::new();
        let mut index = 0;
        while index < self.document.len() {
            match self.block_at(index) {
                Some(block) => {
                    index = block.end + 1;
                    blocks.push(block);
                }
                None => index += 1,
            }
        }
        blocks
    }

    pub fn find_project_block(&self, name: &str, relative_path: &str) -> Option<ProjectBlock> {
        self.projects()
            .into_iter()
            .find(|block| block.declaration.is(name, relative_path))
    }

    /// `EndProject` line of the first project named `anchor_name`.
    pub fn find_anchor_project_end_line(&self, anchor_name: &str) -> Option<usize> {
        self.projects()
            .into_iter()
            .find(|block| block.declaration.name.eq_ignore_ascii_case(anchor_name))
            .map(|block| block.end)
    }

    pub fn find_global_config_section(&self) -> Option<Section> {
        let lines = self.document.lines();
        let start = lines.iter().position(|line| is_configuration_header(line))?;
        let end = lines[start + 1..]
            .iter()
            .position(|line| is_end_global_section(line))?;
        Some(Section {
            start,
            end: start + 1 + end,
        })
    }

    pub fn insert<I, S>(&mut self, index: usize, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document.insert(index, lines);
    }

    pub fn remove_range(&mut self, range: RangeInclusive<usize>) {
        self.document.remove_range(range);
    }

    pub fn apply(&mut self, staged: StagedEdits) {
        self.document.apply(staged);
    }

    /// Parse the block whose declaration sits at `start`.
    fn block_at(&self, start: usize) -> Option<ProjectBlock> {
        let lines = self.document.lines();
        let declaration = ProjectDeclaration::parse(&lines[start])?;

        let mut dependencies = None;
        let mut open_section = None;
        for (index, line) in lines.iter().enumerate().skip(start + 1) {
            if is_end_project(line) {
                return Some(ProjectBlock {
                    declaration,
                    start,
                    end: index,
                    dependencies,
                });
            }
            if ProjectDeclaration::parse(line).is_some() {
                // next block started before this one closed
                return None;
            }
            if dependencies.is_none() && is_dependencies_header(line) {
                open_section = Some(index);
            } else if is_end_project_section(line) {
                if let Some(header) = open_section.take() {
                    dependencies = Some(Section {
                        start: header,
                        end: index,
                    });
                }
            }
        }
        None
    }
}

/// Text with all whitespace removed, for format-tolerant marker comparison.
fn compact(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

fn compact_eq(line: &str, marker: &str) -> bool {
    compact(line).eq_ignore_ascii_case(&compact(marker))
}

/// A bare `EndProject`; `EndProjectSection` does not count.
pub fn is_end_project(line: &str) -> bool {
    compact_eq(line, END_PROJECT)
}

pub fn is_end_project_section(line: &str) -> bool {
    compact_eq(line, END_PROJECT_SECTION)
}

pub fn is_dependencies_header(line: &str) -> bool {
    compact_eq(line, DEPENDENCIES_HEADER)
}

pub fn is_configuration_header(line: &str) -> bool {
    compact_eq(line, CONFIGURATION_HEADER)
}

pub fn is_end_global_section(line: &str) -> bool {
    compact_eq(line, END_GLOBAL_SECTION)
}

/// Re-render a declaration line keeping its original indentation.
pub fn rewrite_declaration(original: &str, declaration: &ProjectDeclaration) -> String {
    format!("{}{}", leading_whitespace(original), declaration.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLUTION: &str = "\
Microsoft Visual Studio Solution File, Format Version 12.00
Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Launcher\", \"launcher.proj\", \"{AAAA0000-0000-0000-0000-000000000001}\"
\tProjectSection(ProjectDependencies) = postProject
\t\t{BBBB0000-0000-0000-0000-000000000002} = {BBBB0000-0000-0000-0000-000000000002}
\tEndProjectSection
EndProject
Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"mymod\", \"mods\\mymod\\mymod.proj\", \"{BBBB0000-0000-0000-0000-000000000002}\"
EndProject
Global
\tGlobalSection(SolutionConfigurationPlatforms) = preSolution
\t\tDebug|Any CPU = Debug|Any CPU
\tEndGlobalSection
\tGlobalSection(ProjectConfigurationPlatforms) = postSolution
\t\t{BBBB0000-0000-0000-0000-000000000002}.Debug|Any CPU.ActiveCfg = Debug|Any CPU
\tEndGlobalSection
EndGlobal
";

    #[test]
    fn parses_declaration() {
        let decl = ProjectDeclaration::parse(
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Launcher\", \"launcher.proj\", \"{AAAA}\"",
        )
        .unwrap();
        assert_eq!(decl.name, "Launcher");
        assert_eq!(decl.relative_path, "launcher.proj");
        assert_eq!(decl.id.as_str(), "{AAAA}");
        assert!(decl.is("LAUNCHER", "Launcher.PROJ"));
        assert_eq!(
            decl.render(),
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Launcher\", \"launcher.proj\", \"{AAAA}\""
        );
    }

    #[test]
    fn rejects_short_declarations() {
        assert!(ProjectDeclaration::parse("Project(\"{X}\") = \"Launcher\"").is_none());
        assert!(ProjectDeclaration::parse("EndProject").is_none());
    }

    #[test]
    fn finds_blocks_and_dependency_sections() {
        let doc = RegistryDocument::parse(SOLUTION);
        let projects = doc.projects();
        assert_eq!(projects.len(), 2);

        let launcher = &projects[0];
        assert_eq!((launcher.start, launcher.end), (1, 5));
        assert_eq!(launcher.dependencies, Some(Section { start: 2, end: 4 }));

        let block = doc.find_project_block("mymod", "mods\\mymod\\mymod.proj").unwrap();
        assert_eq!((block.start, block.end), (6, 7));
        assert_eq!(block.dependencies, None);
        assert_eq!(block.id().as_str(), "{BBBB0000-0000-0000-0000-000000000002}");

        assert!(doc.find_project_block("mymod", "other.proj").is_none());
    }

    #[test]
    fn finds_anchor_end_and_global_section() {
        let doc = RegistryDocument::parse(SOLUTION);
        assert_eq!(doc.find_anchor_project_end_line("launcher"), Some(5));
        assert_eq!(doc.find_anchor_project_end_line("missing"), None);
        assert_eq!(
            doc.find_global_config_section(),
            Some(Section { start: 12, end: 14 })
        );
    }

    #[test]
    fn marker_matching_ignores_whitespace_but_not_suffixes() {
        assert!(is_end_project("  End Project "));
        assert!(!is_end_project("\tEndProjectSection"));
        assert!(is_configuration_header(
            "\tGlobalSection(ProjectConfigurationPlatforms)=postSolution"
        ));
        assert!(!is_configuration_header(
            "\tGlobalSection(SolutionConfigurationPlatforms) = preSolution"
        ));
    }

    #[test]
    fn line_primitives_reshape_blocks() {
        let mut doc = RegistryDocument::parse(SOLUTION);
        let launcher = doc.find_project_block("Launcher", "launcher.proj").unwrap();
        let section = launcher.dependencies.unwrap();

        doc.remove_range(section.lines());
        let launcher = doc.find_project_block("Launcher", "launcher.proj").unwrap();
        assert_eq!(launcher.dependencies, None);
        assert_eq!(launcher.end, launcher.start + 1);

        doc.insert(
            launcher.end,
            [
                "\tProjectSection(ProjectDependencies) = postProject",
                "\t\t{BBBB0000-0000-0000-0000-000000000002} = {BBBB0000-0000-0000-0000-000000000002}",
                "\tEndProjectSection",
            ],
        );
        let launcher = doc.find_project_block("Launcher", "launcher.proj").unwrap();
        assert_eq!(
            launcher.dependencies,
            Some(Section {
                start: launcher.start + 1,
                end: launcher.start + 3,
            })
        );
        assert_eq!(doc.projects().len(), 2);
    }

    #[test]
    fn unterminated_block_is_skipped() {
        let doc = RegistryDocument::parse(
            "Project(\"{T}\") = \"a\", \"a.proj\", \"{A}\"\nProject(\"{T}\") = \"b\", \"b.proj\", \"{B}\"\nEndProject\n",
        );
        let projects = doc.projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].declaration.name, "b");
    }
}
