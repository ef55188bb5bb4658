//! Ordered rule sets applied to one document in a single pass.
//!
//! Every line is offered to every rule in declaration order; the first rule
//! that applies or fails at a line claims it. Rewrites are staged and only
//! reach the document when the whole pass succeeds.
//!
//! A rule counts as applied once it has been scanned at least once, whether or
//! not it ever matched. Only an explicit [`Scan::Failed`] (or never being
//! scanned at all) fails the set. Rules that were scanned but never matched
//! are listed in [`PatchReport::unmatched`] so callers can tell them apart.

use crate::document::{Document, StagedEdits};
use crate::patch::errors::{PatchError, RuleFailure};
use crate::patch::rule::{PatchRule, Scan};

#[derive(Debug, Clone, PartialEq, Eq)]
struct NamedRule {
    name: String,
    rule: PatchRule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    rules: Vec<NamedRule>,
}

/// Summary of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchReport says whether the document actually changed"]
pub struct PatchReport {
    /// Rules that matched at least one line
    pub matched: Vec<String>,
    /// Rules that were scanned but never matched
    pub unmatched: Vec<String>,
    /// Whether the staged edits differ from the original document
    pub changed: bool,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set whose rule names are their descriptions.
    pub fn from_rules(rules: impl IntoIterator<Item = PatchRule>) -> Self {
        let mut set = Self::new();
        for rule in rules {
            let name = rule.to_string();
            set.push(name, rule);
        }
        set
    }

    pub fn push(&mut self, name: impl Into<String>, rule: PatchRule) {
        self.rules.push(NamedRule {
            name: name.into(),
            rule,
        });
    }

    pub fn with_rule(mut self, name: impl Into<String>, rule: PatchRule) -> Self {
        self.push(name, rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|entry| entry.name.as_str())
    }

    /// Run the pass without touching the document.
    pub fn plan(&self, document: &Document) -> Result<(StagedEdits, PatchReport), PatchError> {
        let mut scanned = vec![false; self.rules.len()];
        let mut matched = vec![false; self.rules.len()];
        let mut failures = Vec::new();
        let mut staged = StagedEdits::new();

        let mut index = 0;
        while index < document.len() {
            let mut next = index + 1;
            for (slot, entry) in self.rules.iter().enumerate() {
                let outcome = entry.rule.scan(document, &mut staged, index);
                scanned[slot] = true;
                match outcome {
                    Scan::NoMatch => continue,
                    Scan::Applied { consumed_through } => {
                        tracing::debug!(rule = %entry.name, line = index + 1, "patch rule applied");
                        matched[slot] = true;
                        next = next.max(consumed_through + 1);
                        break;
                    }
                    Scan::Failed { line, reason } => {
                        tracing::debug!(rule = %entry.name, line = line + 1, %reason, "patch rule failed");
                        failures.push(RuleFailure {
                            rule: entry.name.clone(),
                            line: Some(line),
                            text: staged.read(document, line).map(str::to_string),
                            reason,
                        });
                        break;
                    }
                }
            }
            index = next;
        }

        let unscanned_reason = if document.is_empty() {
            "never scanned: the document has no lines"
        } else {
            "never scanned: earlier rules claimed or consumed every line before it was reached"
        };
        for (slot, entry) in self.rules.iter().enumerate() {
            if !scanned[slot] {
                failures.push(RuleFailure {
                    rule: entry.name.clone(),
                    line: None,
                    text: None,
                    reason: unscanned_reason.to_string(),
                });
            }
        }

        if !failures.is_empty() {
            return Err(PatchError::RulesFailed {
                total: self.rules.len(),
                failures,
            });
        }

        let (hit, missed): (Vec<_>, Vec<_>) = self
            .rules
            .iter()
            .zip(matched)
            .partition(|(_, matched)| *matched);

        let report = PatchReport {
            matched: hit.into_iter().map(|(entry, _)| entry.name.clone()).collect(),
            unmatched: missed.into_iter().map(|(entry, _)| entry.name.clone()).collect(),
            changed: staged.changes(document),
        };
        Ok((staged, report))
    }

    /// Run the pass and apply it; on failure the document is left untouched.
    pub fn apply(&self, document: &mut Document) -> Result<PatchReport, PatchError> {
        let (staged, report) = self.plan(document)?;
        document.apply(staged);
        Ok(report)
    }
}
