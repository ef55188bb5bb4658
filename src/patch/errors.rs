use std::fmt;
use thiserror::Error;

/// One rule that could not be satisfied during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    /// Rule name as registered in the patch set
    pub rule: String,
    /// Line the failure was detected at, if the rule was scanned at all
    pub line: Option<usize>,
    /// Text of that line at the time of failure
    pub text: Option<String>,
    pub reason: String,
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, &self.text) {
            (Some(line), Some(text)) => write!(
                f,
                "rule {} failed at line {}: {} ({:?})",
                self.rule,
                line + 1,
                self.reason,
                text.trim()
            ),
            (Some(line), None) => {
                write!(f, "rule {} failed at line {}: {}", self.rule, line + 1, self.reason)
            }
            _ => write!(f, "rule {} failed: {}", self.rule, self.reason),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("{count} of {total} patch rule(s) could not be applied", count = .failures.len())]
    RulesFailed {
        total: usize,
        failures: Vec<RuleFailure>,
    },
}

impl PatchError {
    pub fn failures(&self) -> &[RuleFailure] {
        match self {
            PatchError::RulesFailed { failures, .. } => failures,
        }
    }
}
