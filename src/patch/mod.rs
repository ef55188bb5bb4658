pub mod errors;
pub mod rule;
pub mod set;

pub use errors::{PatchError, RuleFailure};
pub use rule::{LineRule, PatchRule, RangeReplaceRule, Scan, ScopedLineRule};
pub use set::{PatchReport, PatchSet};
