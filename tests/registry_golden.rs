use solution_patcher::ops::add_project_entry;
use solution_patcher::registry::{AnchorProject, ProjectId, RegistryDocument, RegistryEditor};
use std::fs;

const NEW_ID: &str = "{0A1B2C3D-0000-4000-8000-000000000001}";

fn load_fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}"))
        .unwrap_or_else(|err| panic!("failed to load fixture {name}: {err}"))
}

fn editor() -> RegistryEditor {
    RegistryEditor::new(AnchorProject::new("VSModLauncher", "VSModLauncher.csproj"))
}

#[test]
fn add_project_matches_fixture() {
    let input = load_fixture("Mods.sln.input");
    let expected = load_fixture("Mods.sln.expected");

    let mut document = RegistryDocument::parse(&input);
    let entry = editor()
        .add_with(
            &mut document,
            "NewMod",
            "mods\\NewMod\\NewMod.csproj",
            &mut || ProjectId::parse(NEW_ID).unwrap(),
        )
        .expect("add");

    assert_eq!(entry.id.as_str(), NEW_ID);
    assert_eq!(document.render(), expected);
}

#[test]
fn remove_project_restores_fixture() {
    let input = load_fixture("Mods.sln.input");
    let expected = load_fixture("Mods.sln.expected");

    let mut document = RegistryDocument::parse(&expected);
    let entry = editor()
        .remove(&mut document, "NewMod", "mods\\NewMod\\NewMod.csproj")
        .expect("remove");

    assert_eq!(entry.id.as_str(), NEW_ID);
    assert_eq!(document.render(), input);
}

#[test]
fn relink_of_linked_project_is_noop() {
    let input = load_fixture("Mods.sln.input");

    let mut document = RegistryDocument::parse(&input);
    editor()
        .relink(
            &mut document,
            "ExistingMod",
            "mods\\ExistingMod\\ExistingMod.csproj",
        )
        .expect("relink");

    assert_eq!(document.render(), input);
}

#[test]
fn list_projects_in_fixture() {
    let document = RegistryDocument::parse(&load_fixture("Mods.sln.expected"));
    let names: Vec<_> = document
        .projects()
        .into_iter()
        .map(|block| block.declaration.name)
        .collect();
    assert_eq!(names, ["VSModLauncher", "NewMod", "ExistingMod"]);
}

#[test]
fn add_to_file_keeps_bom_and_crlf() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let path = temp_dir.path().join("Mods.sln");
    fs::write(&path, load_fixture("Mods.sln.input")).expect("write fixture");

    let entry = add_project_entry(&path, &editor(), "Other", "mods\\Other\\Other.csproj")
        .expect("add");

    let bytes = fs::read(&path).expect("read back");
    assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]));
    let text = String::from_utf8(bytes).expect("utf-8");
    assert!(!text.replace("\r\n", "").contains('\n'));

    let id_lines = text.lines().filter(|line| entry.id.is_referenced_by(line)).count();
    assert_eq!(id_lines, 8);
}
