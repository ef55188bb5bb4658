use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Bracketed project id, e.g. `{0F2B6C1E-3C4D-4E5F-8A9B-0C1D2E3F4A5B}`.
///
/// Ids are compared ASCII case-insensitively, the way solution tooling treats
/// them.
#[derive(Debug, Clone, Eq, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn generate() -> Self {
        Self(format!("{{{}}}", Uuid::new_v4().to_string().to_ascii_uppercase()))
    }

    /// Accept a `{...}` token; anything else is not an id.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let inner = token.strip_prefix('{')?.strip_suffix('}')?;
        if inner.is_empty() || inner.contains(['{', '}']) {
            return None;
        }
        Some(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `line` mentions this id anywhere.
    pub fn is_referenced_by(&self, line: &str) -> bool {
        line.to_ascii_uppercase()
            .contains(&self.0.to_ascii_uppercase())
    }
}

impl PartialEq for ProjectId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl std::hash::Hash for ProjectId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_ascii_uppercase().hash(state);
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of fresh project ids.
pub trait IdSource {
    fn next_id(&mut self) -> ProjectId;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&mut self) -> ProjectId {
        ProjectId::generate()
    }
}

impl<F> IdSource for F
where
    F: FnMut() -> ProjectId,
{
    fn next_id(&mut self) -> ProjectId {
        self()
    }
}

/// A project registered in a solution document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectEntry {
    pub id: ProjectId,
    pub name: String,
    pub relative_path: String,
}
