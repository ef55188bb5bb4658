//! Property-based invariants for the patch and registry engines.
//!
//! 1. Line rules are idempotent, whether or not the replacement re-matches.
//! 2. A set with a failing rule leaves the file byte-identical.
//! 3. Range replacement on one line with no lines splices the tokens together.
//! 4. Range replacement across lines re-threads the inserted lines in order.
//! 5. Add then Remove restores the solution exactly.
//! 6. After Add one block and six configuration lines carry the new id.

use proptest::prelude::*;
use solution_patcher::document::Document;
use solution_patcher::ops::{apply_patches, SurfaceError};
use solution_patcher::patch::{PatchRule, PatchSet};
use solution_patcher::registry::{AnchorProject, RegistryDocument, RegistryEditor};
use std::fs;

// ── Helpers ─────────────────────────────────────────────────────────────

fn indent_strategy() -> impl Strategy<Value = String> {
    "[ \t]{0,4}"
}

fn text_line_strategy() -> impl Strategy<Value = String> {
    (indent_strategy(), "[abc<>/ ]{0,10}").prop_map(|(indent, body)| format!("{indent}{body}"))
}

fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(text_line_strategy(), 1..16)
}

fn run_once(set: &PatchSet, lines: &[String]) -> Vec<String> {
    let mut document = Document::from_lines(lines.iter().cloned());
    let _report = set.apply(&mut document).expect("line rules never fail");
    document.lines().to_vec()
}

fn project_id(n: usize) -> String {
    format!("{{{:08X}-0000-4000-8000-000000000000}}", n + 1)
}

const ANCHOR_ID: &str = "{AAAAAAAA-0000-4000-8000-000000000000}";
const CSHARP: &str = "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}";

/// Solution with a Launcher anchor, `linked.len()` other projects and the
/// anchor depending on the ones flagged in `linked`.
fn solution_text(linked: &[bool], crlf: bool) -> String {
    let mut lines = vec![
        "Microsoft Visual Studio Solution File, Format Version 12.00".to_string(),
        format!("Project(\"{CSHARP}\") = \"Launcher\", \"launcher.proj\", \"{ANCHOR_ID}\""),
    ];
    if linked.iter().any(|linked| *linked) {
        lines.push("\tProjectSection(ProjectDependencies) = postProject".to_string());
        for (n, _) in linked.iter().enumerate().filter(|(_, linked)| **linked) {
            let id = project_id(n);
            lines.push(format!("\t\t{id} = {id}"));
        }
        lines.push("\tEndProjectSection".to_string());
    }
    lines.push("EndProject".to_string());

    for n in 0..linked.len() {
        lines.push(format!(
            "Project(\"{CSHARP}\") = \"p{n}\", \"p{n}\\p{n}.proj\", \"{}\"",
            project_id(n)
        ));
        lines.push("EndProject".to_string());
    }

    lines.push("Global".to_string());
    lines.push("\tGlobalSection(ProjectConfigurationPlatforms) = postSolution".to_string());
    for n in 0..linked.len() {
        let id = project_id(n);
        lines.push(format!("\t\t{id}.Debug|Any CPU.ActiveCfg = Debug|Any CPU"));
        lines.push(format!("\t\t{id}.Debug|Any CPU.Build.0 = Debug|Any CPU"));
    }
    lines.push("\tEndGlobalSection".to_string());
    lines.push("EndGlobal".to_string());

    let ending = if crlf { "\r\n" } else { "\n" };
    let mut text = lines.join(ending);
    text.push_str(ending);
    text
}

fn editor() -> RegistryEditor {
    RegistryEditor::new(AnchorProject::new("Launcher", "launcher.proj"))
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Line rules are idempotent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn line_rule_idempotent_when_replacement_rematches(
        lines in lines_strategy(),
        pattern in "[abc<]{1,3}",
        rest in "[abc>/]{0,6}",
    ) {
        // the replacement starts with the pattern, so the second pass matches
        // again and writes the same text
        let set = PatchSet::from_rules([PatchRule::line(&pattern, format!("{pattern}{rest}"))]);
        let once = run_once(&set, &lines);
        let twice = run_once(&set, &once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn line_rule_idempotent_when_replacement_does_not_rematch(
        lines in lines_strategy(),
        pattern in "[abc<]{1,3}",
        replacement in "x[abc>/]{0,6}",
    ) {
        let set = PatchSet::from_rules([PatchRule::line(&pattern, &replacement)]);
        let once = run_once(&set, &lines);
        let twice = run_once(&set, &once);
        prop_assert_eq!(&once, &twice);

        let mut document = Document::from_lines(once.iter().cloned());
        let report = set.apply(&mut document).unwrap();
        prop_assert!(!report.changed);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Failed sets never reach the disk
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn failed_set_leaves_file_byte_identical(
        lines in lines_strategy(),
        start_at in 0usize..16,
        crlf in any::<bool>(),
    ) {
        let mut lines = lines;
        let start_at = start_at.min(lines.len());
        lines.insert(start_at, "  <PostBuildEvent>copy".to_string());

        let ending = if crlf { "\r\n" } else { "\n" };
        let text = lines.join(ending) + ending;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("project.csproj");
        fs::write(&path, &text).unwrap();

        let set = PatchSet::from_rules([
            PatchRule::line("a", "replaced"),
            PatchRule::range_replace("<PostBuildEvent>", "#never#", ["x"]),
        ]);
        let result = apply_patches(&path, &set);

        prop_assert!(matches!(result, Err(SurfaceError::Patch(_))));
        prop_assert_eq!(fs::read(&path).unwrap(), text.into_bytes());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3-4. Range reconstruction
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn same_line_range_with_no_lines_splices_tokens(
        pre in "[xyz ]{0,6}",
        mid in "[xyz <>]{0,8}",
        post in "[xyz ]{0,6}",
    ) {
        let line = format!("{pre}<a>{mid}</a>{post}");
        let set = PatchSet::from_rules([PatchRule::range_replace("<a>", "</a>", Vec::<String>::new())]);
        let result = run_once(&set, &[line]);
        prop_assert_eq!(result, vec![format!("{pre}<a></a>{post}")]);
    }

    #[test]
    fn multi_line_range_rethreads_lines(
        before in lines_strategy(),
        inside in prop::collection::vec("[xyz ]{0,6}", 0..5),
        replacement in prop::collection::vec("[xyz]{1,6}", 2..5),
    ) {
        let mut lines = before;
        let start = lines.len();
        lines.push("\t#begin old".to_string());
        lines.extend(inside.iter().cloned());
        lines.push("old #end tail".to_string());

        let set = PatchSet::from_rules([PatchRule::range_replace("#begin", "#end", replacement.clone())]);
        let result = run_once(&set, &lines);

        prop_assert_eq!(&result[..start], &lines[..start]);
        let spliced = &result[start..];
        prop_assert_eq!(spliced.len(), replacement.len());
        prop_assert_eq!(&spliced[0], &format!("\t#begin{}", replacement[0]));
        for (line, expected) in spliced[1..spliced.len() - 1].iter().zip(&replacement[1..]) {
            prop_assert_eq!(line, expected);
        }
        prop_assert_eq!(
            spliced.last().unwrap(),
            &format!("{}#end tail", replacement.last().unwrap())
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5-6. Registry round trip and reference counts
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn add_then_remove_is_identity(
        linked in prop::collection::vec(any::<bool>(), 0..5),
        crlf in any::<bool>(),
    ) {
        let text = solution_text(&linked, crlf);
        let editor = editor();
        let mut document = RegistryDocument::parse(&text);

        let added = editor.add(&mut document, "foo", "foo\\foo.proj").unwrap();
        let removed = editor.remove(&mut document, "foo", "foo\\foo.proj").unwrap();

        prop_assert_eq!(added, removed);
        prop_assert_eq!(document.render(), text);
    }

    #[test]
    fn add_references_new_id_exactly(
        linked in prop::collection::vec(any::<bool>(), 0..5),
    ) {
        let text = solution_text(&linked, false);
        let mut document = RegistryDocument::parse(&text);
        let entry = editor().add(&mut document, "foo", "foo\\foo.proj").unwrap();

        let blocks = document
            .projects()
            .into_iter()
            .filter(|block| block.id() == &entry.id)
            .count();
        prop_assert_eq!(blocks, 1);

        let section = document.find_global_config_section().unwrap();
        let configuration_lines = section
            .body()
            .filter(|index| entry.id.is_referenced_by(&document.lines()[*index]))
            .count();
        prop_assert_eq!(configuration_lines, 6);

        let anchor = document.find_project_block("Launcher", "launcher.proj").unwrap();
        let dependencies = anchor.dependencies.unwrap();
        let listed = dependencies
            .body()
            .filter(|index| entry.id.is_referenced_by(&document.lines()[*index]))
            .count();
        prop_assert_eq!(listed, 1);

        editor().remove(&mut document, "foo", "foo\\foo.proj").unwrap();
        let remaining = document
            .lines()
            .iter()
            .filter(|line| entry.id.is_referenced_by(line))
            .count();
        prop_assert_eq!(remaining, 0);
    }
}
