use crate::patch::{PatchRule, PatchSet};
use crate::registry::{
    default_configurations, default_legacy_project_types, AnchorProject, ConfigurationMapping,
    ProjectId, RegistryEditor, DEFAULT_PROJECT_TYPE,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchManifest {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

impl PatchManifest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.patches.is_empty() && self.registry.is_none() {
            issues.push(ValidationIssue::EmptyManifest);
        }

        let mut seen = HashSet::new();
        for patch in &self.patches {
            if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            } else if !seen.insert(patch.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId {
                    patch_id: patch.id.clone(),
                });
            }
            if patch.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: Some(patch.id.clone()),
                    field: "file",
                });
            }
            if patch.rules.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: Some(patch.id.clone()),
                    field: "rules",
                });
            }

            for rule in &patch.rules {
                for field in rule.empty_fields() {
                    issues.push(ValidationIssue::MissingField {
                        patch_id: Some(patch.id.clone()),
                        field,
                    });
                }
            }
        }

        if let Some(registry) = &self.registry {
            registry.validate(&mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Registry editor from `[registry]`, or the defaults when absent.
    pub fn editor(&self) -> RegistryEditor {
        self.registry.clone().unwrap_or_default().editor()
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workspace_relative: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_anchor_name")]
    pub anchor_name: String,
    #[serde(default = "default_anchor_path")]
    pub anchor_path: String,
    #[serde(default = "default_project_type")]
    pub project_type: String,
    /// Types `relink` converts to `project_type`
    #[serde(default = "default_legacy_project_types")]
    pub legacy_project_types: Vec<String>,
    #[serde(default = "default_configuration_configs")]
    pub configurations: Vec<ConfigurationConfig>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            anchor_name: default_anchor_name(),
            anchor_path: default_anchor_path(),
            project_type: default_project_type(),
            legacy_project_types: default_legacy_project_types(),
            configurations: default_configuration_configs(),
        }
    }
}

impl RegistryConfig {
    pub fn editor(&self) -> RegistryEditor {
        RegistryEditor::new(AnchorProject::new(&self.anchor_name, &self.anchor_path))
            .with_project_type(&self.project_type)
            .with_legacy_project_types(self.legacy_project_types.clone())
            .with_configurations(
                self.configurations
                    .iter()
                    .map(|c| ConfigurationMapping::new(&c.solution, &c.project))
                    .collect(),
            )
    }

    fn validate(&self, issues: &mut Vec<ValidationIssue>) {
        if self.anchor_name.trim().is_empty() {
            issues.push(ValidationIssue::Registry {
                message: "anchor_name must not be empty".to_string(),
            });
        }
        if self.anchor_path.trim().is_empty() {
            issues.push(ValidationIssue::Registry {
                message: "anchor_path must not be empty".to_string(),
            });
        }
        if ProjectId::parse(&self.project_type).is_none() {
            issues.push(ValidationIssue::Registry {
                message: format!(
                    "project_type must be a bracketed id like {DEFAULT_PROJECT_TYPE}, got '{}'",
                    self.project_type
                ),
            });
        }
        for legacy in &self.legacy_project_types {
            if ProjectId::parse(legacy).is_none() {
                issues.push(ValidationIssue::Registry {
                    message: format!("legacy_project_types entry '{legacy}' is not a bracketed id"),
                });
            }
        }
        if self.configurations.is_empty() {
            issues.push(ValidationIssue::Registry {
                message: "at least one configuration is required".to_string(),
            });
        }
        for configuration in &self.configurations {
            if configuration.solution.trim().is_empty() || configuration.project.trim().is_empty()
            {
                issues.push(ValidationIssue::Registry {
                    message: "configuration entries need both solution and project".to_string(),
                });
            }
        }
    }
}

fn default_anchor_name() -> String {
    "VSModLauncher".to_string()
}

fn default_anchor_path() -> String {
    "VSModLauncher.csproj".to_string()
}

fn default_project_type() -> String {
    DEFAULT_PROJECT_TYPE.to_string()
}

fn default_configuration_configs() -> Vec<ConfigurationConfig> {
    default_configurations()
        .into_iter()
        .map(|mapping| ConfigurationConfig {
            solution: mapping.solution,
            project: mapping.project,
        })
        .collect()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ConfigurationConfig {
    pub solution: String,
    pub project: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub file: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl PatchDefinition {
    /// Rules named `<id>#<n> <description>`, 1-based.
    pub fn patch_set(&self) -> PatchSet {
        let mut set = PatchSet::new();
        for (n, definition) in self.rules.iter().enumerate() {
            let rule = definition.to_rule();
            set.push(format!("{}#{} {}", self.id, n + 1, rule), rule);
        }
        set
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleDefinition {
    Line {
        pattern: String,
        replacement: String,
    },
    ScopedLine {
        scope_start: String,
        pattern: String,
        replacement: String,
        scope_end: String,
    },
    RangeReplace {
        start: String,
        end: String,
        #[serde(default)]
        lines: Vec<String>,
    },
}

impl RuleDefinition {
    pub fn to_rule(&self) -> PatchRule {
        match self {
            RuleDefinition::Line {
                pattern,
                replacement,
            } => PatchRule::line(pattern, replacement),
            RuleDefinition::ScopedLine {
                scope_start,
                pattern,
                replacement,
                scope_end,
            } => PatchRule::scoped_line(scope_start, pattern, replacement, scope_end),
            RuleDefinition::RangeReplace { start, end, lines } => {
                PatchRule::range_replace(start, end, lines.iter().cloned())
            }
        }
    }

    /// Matching fields that are blank; a blank marker matches every line.
    fn empty_fields(&self) -> Vec<&'static str> {
        let fields: Vec<(&'static str, &str)> = match self {
            RuleDefinition::Line { pattern, .. } => vec![("rules.pattern", pattern.as_str())],
            RuleDefinition::ScopedLine {
                scope_start,
                pattern,
                scope_end,
                ..
            } => vec![
                ("rules.scope_start", scope_start.as_str()),
                ("rules.pattern", pattern.as_str()),
                ("rules.scope_end", scope_end.as_str()),
            ],
            RuleDefinition::RangeReplace { start, end, .. } => {
                vec![("rules.start", start.as_str()), ("rules.end", end.as_str())]
            }
        };
        fields
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyManifest,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        patch_id: String,
    },
    Registry {
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyManifest => {
                write!(f, "manifest has neither patches nor a [registry] section")
            }
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId { patch_id } => {
                write!(f, "patch id '{patch_id}' is used more than once")
            }
            ValidationIssue::Registry { message } => write!(f, "invalid [registry]: {message}"),
        }
    }
}
