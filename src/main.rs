use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use solution_patcher::config::{load_from_path, PatchManifest, RegistryConfig};
use solution_patcher::ops::{
    apply_manifest, check_manifest, edit_registry, PatchResult, RegistryAction, SurfaceError,
};
use solution_patcher::registry::{RegistryDocument, RegistryEditor};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "solution-patcher")]
#[command(
    about = "Idempotent line patches for project and solution files",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patch manifests to a workspace
    Apply {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Specific manifest to apply (otherwise applies all in patches/)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report which patches are applied without modifying files
    Status {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Specific manifest to check (otherwise checks all in patches/)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Register a project in the solution under the anchor project
    Add(RegistryArgs),

    /// Remove a project and every line referencing it from the solution
    Remove(RegistryArgs),

    /// Re-attach an existing project to the anchor project
    Relink(RegistryArgs),

    /// List the projects declared in the solution
    List {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Solution file (otherwise the single *.sln in the workspace)
        #[arg(short, long)]
        solution: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct RegistryArgs {
    /// Project name as it appears in the solution
    name: String,

    /// Project path relative to the solution, e.g. mods\mymod\mymod.csproj
    relative_path: String,

    /// Path to workspace root (auto-detected if not specified)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Solution file (otherwise the single *.sln in the workspace)
    #[arg(short, long)]
    solution: Option<PathBuf>,

    /// Manifest whose [registry] section configures the anchor project
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Dry run - show what would be changed without modifying files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            workspace,
            manifest,
            dry_run,
            diff,
        } => cmd_apply(workspace, manifest, dry_run, diff),

        Commands::Status {
            workspace,
            manifest,
        } => cmd_status(workspace, manifest),

        Commands::Add(args) => cmd_registry(RegistryAction::Add, args),

        Commands::Remove(args) => cmd_registry(RegistryAction::Remove, args),

        Commands::Relink(args) => cmd_registry(RegistryAction::Relink, args),

        Commands::List {
            workspace,
            solution,
            json,
        } => cmd_list(workspace, solution, json),
    }
}

/// Diagnostics go to stderr, filtered by `SOLUTION_PATCHER_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SOLUTION_PATCHER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Helper: Discover all .toml manifests in `<workspace>/patches`.
fn discover_manifests(workspace: &Path) -> Result<Vec<PathBuf>> {
    let patches_dir = workspace.join("patches");
    if !patches_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&patches_dir).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Helper: Explicit manifest, or everything in patches/.
fn manifest_files(workspace: &Path, manifest: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    if let Some(path) = manifest {
        return Ok(vec![path]);
    }

    let files = discover_manifests(workspace)?;
    if files.is_empty() {
        anyhow::bail!(
            "No .toml manifests found in {}/patches",
            workspace.display()
        );
    }
    Ok(files)
}

/// Resolve workspace path
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. SOLUTION_PATCHER_WORKSPACE environment variable
/// 3. Nearest ancestor of the current directory holding a *.sln file
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("SOLUTION_PATCHER_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: SOLUTION_PATCHER_WORKSPACE is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    if let Some(path) = auto_detect_workspace() {
        eprintln!(
            "{}",
            format!("Auto-detected workspace: {}", path.display()).dimmed()
        );
        return Ok(path);
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find a solution workspace.".red(),
        "Try one of:".bold(),
        "1. cd into the directory holding your .sln file",
        "2. Specify explicitly: solution-patcher apply --workspace /path/to/workspace",
        "3. Set environment variable: export SOLUTION_PATCHER_WORKSPACE=/path/to/workspace"
    )
}

fn auto_detect_workspace() -> Option<PathBuf> {
    let current = env::current_dir().ok()?;
    current
        .ancestors()
        .find(|ancestor| !solution_files(ancestor).is_empty())
        .map(Path::to_path_buf)
}

fn solution_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("sln"))
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Helper: Explicit --solution, or the only *.sln in the workspace.
fn resolve_solution(workspace: &Path, solution: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = solution {
        return Ok(path);
    }

    let mut files = solution_files(workspace);
    match files.len() {
        0 => anyhow::bail!("No .sln file found in {}", workspace.display()),
        1 => Ok(files.remove(0)),
        n => anyhow::bail!(
            "{} .sln files found in {}; pick one with --solution",
            n,
            workspace.display()
        ),
    }
}

/// Helper: Registry settings from --manifest, else the first manifest in
/// patches/ with a [registry] section, else the defaults.
fn resolve_editor(workspace: &Path, manifest: Option<PathBuf>) -> Result<RegistryEditor> {
    if let Some(path) = manifest {
        return Ok(load_from_path(&path)?.editor());
    }

    for path in discover_manifests(workspace)? {
        let manifest = match load_from_path(&path) {
            Ok(manifest) => manifest,
            Err(e) => {
                eprintln!(
                    "{}",
                    format!("Warning: skipping {}: {}", path.display(), e).yellow()
                );
                continue;
            }
        };
        if let Some(registry) = manifest.registry {
            return Ok(registry.editor());
        }
    }

    Ok(RegistryConfig::default().editor())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn load_manifest(path: &Path) -> Result<PatchManifest> {
    println!("Loading patches from {}...", path.display());
    Ok(load_from_path(path)?)
}

fn report_error(patch_id: &str, error: &SurfaceError) {
    eprintln!("{} {}: Error - {}", "✗".red(), patch_id, error);
    match error {
        SurfaceError::Patch(patch_error) => {
            eprintln!("  {}", "CONFLICT: rules could not be satisfied".red());
            for failure in patch_error.failures() {
                eprintln!("    - {}", failure);
            }
            eprintln!("  Possible causes:");
            eprintln!("    - Anchor text was renamed or removed");
            eprintln!("    - Scope or range end marker is missing");
        }
        SurfaceError::Document(document_error) => {
            eprintln!("  File error: {}", document_error);
        }
        _ => {}
    }
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    manifest: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let manifest_files = manifest_files(&workspace, manifest)?;

    println!("Workspace: {}", workspace.display());
    println!();

    let mut total_applied = 0;
    let mut total_already_applied = 0;
    let mut total_failed = 0;

    for manifest_file in manifest_files {
        let manifest = load_manifest(&manifest_file)?;

        if manifest.patches.is_empty() {
            println!("{}", "  No patches found in file".yellow());
            continue;
        }

        if dry_run {
            println!("{}", "  [DRY RUN - showing what would be applied]".cyan());
        }

        for (patch_id, result) in apply_manifest(&manifest, &workspace, dry_run) {
            match result {
                Ok(PatchResult::Applied { change, unmatched }) => {
                    let verb = if dry_run { "Would apply to" } else { "Applied to" };
                    println!(
                        "{} {}: {} {}",
                        "✓".green(),
                        patch_id,
                        verb,
                        change.file.display()
                    );
                    for rule in &unmatched {
                        println!("    {} {}", "matched nothing:".dimmed(), rule);
                    }
                    total_applied += 1;

                    if show_diff {
                        display_diff(&change.file, &change.before, &change.after);
                    }
                }
                Ok(PatchResult::AlreadyApplied { file }) => {
                    println!(
                        "{} {}: Already applied to {}",
                        "⊙".yellow(),
                        patch_id,
                        file.display()
                    );
                    total_already_applied += 1;
                }
                Err(e) => {
                    report_error(&patch_id, &e);
                    total_failed += 1;
                }
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!(
        "  {} already applied",
        format!("{}", total_already_applied).yellow()
    );
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(workspace: Option<PathBuf>, manifest: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let manifest_files = manifest_files(&workspace, manifest)?;

    println!("{}", "Patch Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut failing = Vec::new();

    for manifest_file in manifest_files {
        let manifest = load_from_path(&manifest_file)?;
        for (patch_id, result) in check_manifest(&manifest, &workspace) {
            match result {
                Ok(PatchResult::AlreadyApplied { .. }) => applied.push(patch_id),
                Ok(PatchResult::Applied { change, .. }) => {
                    pending.push((patch_id, change.file.display().to_string()))
                }
                Err(e) => failing.push((patch_id, e.to_string())),
            }
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} patches)",
            "⊙".yellow(),
            "NOT APPLIED".yellow().bold(),
            pending.len()
        );
        for (id, file) in &pending {
            println!("  - {} ({})", id, file.dimmed());
        }
        println!();
    }

    if !failing.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✗".red(),
            "FAILING".red().bold(),
            failing.len()
        );
        for (id, reason) in &failing {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_registry(action: RegistryAction, args: RegistryArgs) -> Result<()> {
    let workspace = resolve_workspace(args.workspace)?;
    let solution = resolve_solution(&workspace, args.solution)?;
    let editor = resolve_editor(&workspace, args.manifest)?;

    println!("Solution: {}", solution.display());
    if args.dry_run {
        println!("{}", "[DRY RUN - showing what would be changed]".cyan());
    }

    let outcome = match edit_registry(
        &solution,
        &editor,
        action,
        &args.name,
        &args.relative_path,
        args.dry_run,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} {} {}: {}", "✗".red(), action, args.name, e);
            std::process::exit(1);
        }
    };

    let verb = match (action, args.dry_run) {
        (RegistryAction::Add, false) => "Added",
        (RegistryAction::Add, true) => "Would add",
        (RegistryAction::Remove, false) => "Removed",
        (RegistryAction::Remove, true) => "Would remove",
        (RegistryAction::Relink, false) => "Relinked",
        (RegistryAction::Relink, true) => "Would relink",
    };

    if outcome.change.is_noop() {
        println!(
            "{} {} is already linked to {}",
            "⊙".yellow(),
            outcome.entry.name,
            editor.anchor().name
        );
    } else {
        println!(
            "{} {} {} ({}) {}",
            "✓".green(),
            verb,
            outcome.entry.name,
            outcome.entry.relative_path,
            outcome.entry.id.to_string().dimmed()
        );
    }

    if args.diff {
        display_diff(
            &outcome.change.file,
            &outcome.change.before,
            &outcome.change.after,
        );
    }

    Ok(())
}

fn cmd_list(workspace: Option<PathBuf>, solution: Option<PathBuf>, json: bool) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let solution = resolve_solution(&workspace, solution)?;
    let document = RegistryDocument::load(&solution)?;

    let entries: Vec<_> = document.projects().iter().map(|block| block.entry()).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", format!("Projects in {}", solution.display()).bold());
    for entry in &entries {
        println!(
            "  {} {} {}",
            entry.name.green(),
            entry.relative_path,
            entry.id.to_string().dimmed()
        );
    }
    println!("  {} project(s)", entries.len());

    Ok(())
}
