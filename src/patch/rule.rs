use crate::document::{Document, StagedEdits};
use std::fmt;

/// Outcome of scanning one line with one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// Line unrelated to this rule
    NoMatch,
    /// Rule rewrote the document; lines up to `consumed_through` are claimed
    Applied { consumed_through: usize },
    /// Rule started matching but could not complete
    Failed { line: usize, reason: String },
}

/// Replace a line whose trimmed text starts with `pattern`, keeping its indent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRule {
    pub pattern: String,
    pub replacement: String,
}

/// A [`LineRule`] that only fires between a `scope_start` line and the next
/// `scope_end` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedLineRule {
    pub scope_start: String,
    pub inner: LineRule,
    pub scope_end: String,
}

/// Replace everything between `start_token` and the next `end_token` with
/// `lines`, keeping both tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeReplaceRule {
    pub start_token: String,
    pub end_token: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchRule {
    Line(LineRule),
    ScopedLine(ScopedLineRule),
    RangeReplace(RangeReplaceRule),
}

impl PatchRule {
    pub fn line(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        PatchRule::Line(LineRule {
            pattern: pattern.into(),
            replacement: replacement.into(),
        })
    }

    pub fn scoped_line(
        scope_start: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
        scope_end: impl Into<String>,
    ) -> Self {
        PatchRule::ScopedLine(ScopedLineRule {
            scope_start: scope_start.into(),
            inner: LineRule {
                pattern: pattern.into(),
                replacement: replacement.into(),
            },
            scope_end: scope_end.into(),
        })
    }

    pub fn range_replace<I, S>(
        start_token: impl Into<String>,
        end_token: impl Into<String>,
        lines: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PatchRule::RangeReplace(RangeReplaceRule {
            start_token: start_token.into(),
            end_token: end_token.into(),
            lines: lines.into_iter().map(Into::into).collect(),
        })
    }

    /// Scan the line at `index`, staging any rewrite into `staged`.
    pub fn scan(&self, document: &Document, staged: &mut StagedEdits, index: usize) -> Scan {
        match self {
            PatchRule::Line(rule) => rule.scan(document, staged, index),
            PatchRule::ScopedLine(rule) => rule.scan(document, staged, index),
            PatchRule::RangeReplace(rule) => rule.scan(document, staged, index),
        }
    }
}

impl fmt::Display for PatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchRule::Line(rule) => write!(f, "line '{}'", rule.pattern),
            PatchRule::ScopedLine(rule) => write!(
                f,
                "line '{}' within '{}'..'{}'",
                rule.inner.pattern, rule.scope_start, rule.scope_end
            ),
            PatchRule::RangeReplace(rule) => {
                write!(f, "range '{}'..'{}'", rule.start_token, rule.end_token)
            }
        }
    }
}

impl LineRule {
    pub fn matches(&self, line: &str) -> bool {
        starts_with_ignore_case(line, &self.pattern)
    }

    fn scan(&self, document: &Document, staged: &mut StagedEdits, index: usize) -> Scan {
        let rewritten = match staged.read(document, index) {
            Some(line) if self.matches(line) => {
                format!("{}{}", leading_whitespace(line), self.replacement)
            }
            _ => return Scan::NoMatch,
        };
        staged.replace(index, rewritten);
        Scan::Applied {
            consumed_through: index,
        }
    }
}

impl ScopedLineRule {
    fn scan(&self, document: &Document, staged: &mut StagedEdits, index: usize) -> Scan {
        match staged.read(document, index) {
            Some(line) if starts_with_ignore_case(line, &self.scope_start) => {}
            _ => return Scan::NoMatch,
        }

        // The scope's opening line is itself a candidate for the inner rule.
        for cursor in index..document.len() {
            if staged.is_deleted(cursor) {
                continue;
            }
            let closes = staged
                .read(document, cursor)
                .is_some_and(|line| starts_with_ignore_case(line, &self.scope_end));
            if closes {
                return Scan::Failed {
                    line: cursor,
                    reason: format!(
                        "'{}' closed the scope before '{}' matched",
                        self.scope_end, self.inner.pattern
                    ),
                };
            }
            if let Scan::Applied { .. } = self.inner.scan(document, staged, cursor) {
                return Scan::Applied {
                    consumed_through: index,
                };
            }
        }

        Scan::Failed {
            line: index,
            reason: format!("scope opened here is never closed by '{}'", self.scope_end),
        }
    }
}

impl RangeReplaceRule {
    fn scan(&self, document: &Document, staged: &mut StagedEdits, index: usize) -> Scan {
        let Some(start_line) = staged.read(document, index) else {
            return Scan::NoMatch;
        };
        let Some(start_at) = start_line.find(&self.start_token) else {
            return Scan::NoMatch;
        };
        let prefix_end = start_at + self.start_token.len();
        let prefix = start_line[..prefix_end].to_string();

        let Some((end_index, suffix)) = self.find_end(document, staged, index, prefix_end) else {
            return Scan::Failed {
                line: index,
                reason: format!("'{}' never follows '{}'", self.end_token, self.start_token),
            };
        };

        let mut head = prefix;
        let mut tail: Vec<String> = Vec::new();
        match self.lines.split_first() {
            None => head.push_str(&suffix),
            Some((first, rest)) => {
                head.push_str(first);
                if rest.is_empty() {
                    head.push_str(&suffix);
                } else {
                    tail = rest.to_vec();
                    if let Some(last) = tail.last_mut() {
                        last.push_str(&suffix);
                    }
                }
            }
        }

        staged.replace(index, head);
        if end_index > index {
            staged.delete_range(index + 1..=end_index);
        }
        staged.insert_before(index + 1, tail);

        Scan::Applied {
            consumed_through: end_index,
        }
    }

    /// Locate the end token, returning its line and the text from the token on.
    fn find_end(
        &self,
        document: &Document,
        staged: &StagedEdits,
        index: usize,
        search_from: usize,
    ) -> Option<(usize, String)> {
        for cursor in index..document.len() {
            if cursor != index && staged.is_deleted(cursor) {
                continue;
            }
            let line = staged.read(document, cursor)?;
            let offset = if cursor == index { search_from } else { 0 };
            if let Some(found) = line[offset..].find(&self.end_token) {
                return Some((cursor, line[offset + found..].to_string()));
            }
        }
        None
    }
}

/// Trimmed `line` starts with `pattern`, ASCII case-insensitive.
pub fn starts_with_ignore_case(line: &str, pattern: &str) -> bool {
    line.trim()
        .get(..pattern.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(pattern))
}

/// Leading spaces and tabs of `line`.
pub fn leading_whitespace(line: &str) -> &str {
    let rest = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - rest.len()]
}
