//! A mod workspace over its lifetime: launcher paths patched, a mod
//! registered, the IDE rewriting its block, relink, and finally removal.

use solution_patcher::config::load_from_str;
use solution_patcher::document::{Document, DocumentError};
use solution_patcher::ops::{
    add_project_entry, apply_manifest, relink_project_entry, remove_project_entry, PatchResult,
};
use solution_patcher::registry::RegistryDocument;
use std::fs;
use tempfile::TempDir;

const ANCHOR_ID: &str = "{5D4B6C0A-1E2F-4A3B-9C8D-7E6F5A4B3C2D}";
const EXISTING_ID: &str = "{8C1E2D3F-4A5B-4C6D-8E7F-9A0B1C2D3E4F}";
const CSHARP: &str = "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}";
const SDK_STYLE: &str = "{9A19103F-16F7-4668-BE54-9A1E7A4F7556}";

fn load_fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}"))
        .unwrap_or_else(|err| panic!("failed to load fixture {name}: {err}"))
}

fn setup_mod_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Mods.sln"), load_fixture("Mods.sln.input")).unwrap();
    fs::write(
        dir.path().join("VSModLauncher.csproj.user"),
        load_fixture("VSModLauncher.csproj.user.input"),
    )
    .unwrap();
    dir
}

#[test]
fn mod_lifecycle() {
    let workspace = setup_mod_workspace();
    let solution = workspace.path().join("Mods.sln");
    let manifest = load_from_str(&load_fixture("launcher.toml")).unwrap();
    let editor = manifest.editor();

    // launcher paths
    let results = apply_manifest(&manifest, workspace.path(), false);
    assert!(matches!(results[0].1, Ok(PatchResult::Applied { .. })));

    // register
    let entry = add_project_entry(&solution, &editor, "NewMod", "mods\\NewMod\\NewMod.csproj")
        .unwrap();
    let id = entry.id.as_str();
    let registered = fs::read_to_string(&solution).unwrap();
    let dependency = format!("\t\t{id} = {id}\r\n");
    assert!(registered.contains(&dependency));

    // the IDE rewrites the block with its own type and a dependency on the
    // launcher, and drops the launcher's dependency on it
    let block = format!(
        "Project(\"{CSHARP}\") = \"NewMod\", \"mods\\NewMod\\NewMod.csproj\", \"{id}\"\r\nEndProject\r\n"
    );
    let rewritten_block = format!(
        "Project(\"{SDK_STYLE}\") = \"NewMod\", \"mods\\NewMod\\NewMod.csproj\", \"{id}\"\r\n\
         \tProjectSection(ProjectDependencies) = postProject\r\n\
         \t\t{ANCHOR_ID} = {ANCHOR_ID}\r\n\
         \tEndProjectSection\r\n\
         EndProject\r\n"
    );
    assert!(registered.contains(&block));
    let drifted = registered
        .replace(&block, &rewritten_block)
        .replace(&dependency, "");
    fs::write(&solution, &drifted).unwrap();

    // relink restores the launcher's dependency and the project type
    let relinked = relink_project_entry(&solution, &editor, "NewMod", "mods\\NewMod\\NewMod.csproj")
        .unwrap();
    assert_eq!(relinked.id, entry.id);

    let document = RegistryDocument::load(&solution).unwrap();
    let launcher = document
        .find_project_block("VSModLauncher", "VSModLauncher.csproj")
        .unwrap();
    let section = launcher.dependencies.unwrap();
    let listed: Vec<_> = section
        .body()
        .map(|index| document.lines()[index].clone())
        .collect();
    assert_eq!(
        listed,
        [
            format!("\t\t{EXISTING_ID} = {EXISTING_ID}"),
            format!("\t\t{id} = {id}"),
        ]
    );
    let new_mod = document
        .find_project_block("NewMod", "mods\\NewMod\\NewMod.csproj")
        .unwrap();
    assert_eq!(new_mod.declaration.project_type, CSHARP);
    assert!(new_mod.dependencies.is_none());

    // relinking again changes nothing
    let before = fs::read_to_string(&solution).unwrap();
    relink_project_entry(&solution, &editor, "NewMod", "mods\\NewMod\\NewMod.csproj").unwrap();
    assert_eq!(fs::read_to_string(&solution).unwrap(), before);

    // removal leaves the solution as it started
    remove_project_entry(&solution, &editor, "NewMod", "mods\\NewMod\\NewMod.csproj").unwrap();
    assert_eq!(
        fs::read_to_string(&solution).unwrap(),
        load_fixture("Mods.sln.input")
    );
}

#[test]
fn concurrent_edit_is_not_clobbered() {
    let workspace = setup_mod_workspace();
    let solution = workspace.path().join("Mods.sln");

    let mut document = Document::load(&solution).unwrap();
    document.insert(0, ["# local edit"]);

    fs::write(&solution, load_fixture("Mods.sln.expected")).unwrap();

    let err = document.save(&solution).unwrap_err();
    assert!(matches!(err, DocumentError::ConcurrentModification { .. }));
    assert_eq!(
        fs::read_to_string(&solution).unwrap(),
        load_fixture("Mods.sln.expected")
    );
}
