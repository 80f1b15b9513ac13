use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use kt_patcher::config::{load_batch, load_workspace_config};
use kt_patcher::ts::validator::validate_strict;
use kt_patcher::{
    validate_syntax, ElementKind, ElementPath, ElementSnapshot, Modification, ModificationResult,
    RepositoryError, StructuralRepository,
};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "kt-patcher")]
#[command(about = "Path-addressable structural editor for Kotlin sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply modification batches to a workspace
    Apply {
        /// Path to workspace root (defaults to KT_PATCHER_WORKSPACE, then cwd)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Specific batch file to apply (otherwise applies all in edits/)
        #[arg(short, long)]
        batch: Option<PathBuf>,

        /// Dry run - apply in memory without writing files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Print the element at a path
    Get {
        path: ElementPath,

        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// List direct children of an element
    Find {
        path: ElementPath,

        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Only children of this kind (synonyms accepted)
        #[arg(short, long)]
        kind: Option<ElementKind>,

        /// Only children whose name matches this regex
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Check that a file (or stdin, with `-`) contains Kotlin declarations
    Validate {
        file: PathBuf,

        /// Reject any syntax error instead of only checking for structure
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Apply {
            workspace,
            batch,
            dry_run,
            diff,
        } => cmd_apply(workspace, batch, dry_run, diff),

        Commands::Get {
            path,
            workspace,
            json,
        } => cmd_get(workspace, &path, json),

        Commands::Find {
            path,
            workspace,
            kind,
            name,
            json,
        } => cmd_find(workspace, &path, kind, name.as_deref(), json),

        Commands::Validate { file, strict } => cmd_validate(&file, strict),
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("KT_PATCHER_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("kt_patcher=debug")
        } else {
            EnvFilter::new("kt_patcher=info")
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// `--workspace`, else `KT_PATCHER_WORKSPACE` when it points somewhere real,
/// else the current directory.
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("KT_PATCHER_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: KT_PATCHER_WORKSPACE is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?)
}

fn open_repository(workspace: &Path, dry_run: bool) -> Result<StructuralRepository> {
    let mut config = load_workspace_config(workspace)?;
    if dry_run {
        config.persist = false;
    }
    Ok(StructuralRepository::open(workspace, &config)?)
}

/// Batch files (`.toml` or `.json`) directly under `<workspace>/edits/`, sorted.
fn discover_batch_files(workspace: &Path) -> Result<Vec<PathBuf>> {
    let edits_dir = workspace.join("edits");
    if !edits_dir.is_dir() {
        anyhow::bail!("No edits/ directory in {}", workspace.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&edits_dir).max_depth(1) {
        let entry = entry?;
        let is_batch = matches!(
            entry.path().extension().and_then(|s| s.to_str()),
            Some("toml" | "json")
        );
        if entry.file_type().is_file() && is_batch {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No batch files found in {}", edits_dir.display());
    }
    Ok(files)
}

fn display_diff(file: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- a/{file}").dimmed());
    println!("{}", format!("+++ b/{file}").dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{change}").red(),
                ChangeTag::Insert => format!("+{change}").green(),
                ChangeTag::Equal => format!(" {change}").normal(),
            };
            print!("{line}");
            if change.missing_newline() {
                println!();
            }
        }
    }
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    batch: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let batch_files = match batch {
        Some(path) => vec![path],
        None => discover_batch_files(&workspace)?,
    };
    let repo = open_repository(&workspace, dry_run)?;

    println!("Workspace: {}", workspace.display());
    if dry_run {
        println!("{}", "[DRY RUN - nothing is written to disk]".cyan());
    }
    println!();

    let mut total_applied = 0;
    let mut total_already_present = 0;
    let mut total_failed = 0;

    for batch_file in batch_files {
        println!("Loading modifications from {}...", batch_file.display());
        let batch = load_batch(&batch_file)?;

        let mut before: BTreeMap<String, String> = BTreeMap::new();
        if show_diff {
            for modification in &batch.modifications {
                let file = modification.target().file_path().to_string();
                let text = repo.file_text(&file).unwrap_or_default();
                before.entry(file).or_insert(text);
            }
        }

        for result in repo.apply_modifications(batch.modifications) {
            match &result {
                ModificationResult::Success {
                    affected_path,
                    already_present: true,
                    ..
                } => {
                    println!(
                        "{} {}: Already present in {}",
                        "⊙".yellow(),
                        describe(result.modification()),
                        affected_path
                    );
                    total_already_present += 1;
                }
                ModificationResult::Success { affected_path, .. } => {
                    println!(
                        "{} {}: {}",
                        "✓".green(),
                        describe(result.modification()),
                        affected_path
                    );
                    total_applied += 1;
                }
                ModificationResult::Failure {
                    modification,
                    error,
                } => {
                    eprintln!("{} {}: {}", "✗".red(), describe(modification), error);
                    if let RepositoryError::NotFound {
                        suggestion: Some(s),
                        ..
                    } = error
                    {
                        eprintln!("  Did you mean: {}", s.cyan());
                    }
                    total_failed += 1;
                }
            }
        }

        for (file, original) in &before {
            let modified = repo.file_text(file).unwrap_or_default();
            if original != &modified {
                display_diff(file, original, &modified);
            }
        }
        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!(
        "  {} already present",
        format!("{}", total_already_present).yellow()
    );
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn describe(modification: &Modification) -> String {
    format!("{} {}", modification.type_name(), modification.target())
}

fn cmd_get(workspace: Option<PathBuf>, path: &ElementPath, json: bool) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let repo = open_repository(&workspace, true)?;
    let snapshot = repo.get_element(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "{} {} (lines {}-{})",
        snapshot.kind.to_string().cyan(),
        snapshot.path.to_string().bold(),
        snapshot.start_line,
        snapshot.end_line
    );
    println!("{}", snapshot.content);
    if !snapshot.children.is_empty() {
        println!("\n{}", "Children:".bold());
        for child in &snapshot.children {
            println!("  {}", child.path);
        }
    }
    Ok(())
}

fn cmd_find(
    workspace: Option<PathBuf>,
    path: &ElementPath,
    kind: Option<ElementKind>,
    name: Option<&str>,
    json: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let repo = open_repository(&workspace, true)?;
    let found: Vec<ElementSnapshot> = repo.find_elements(path, kind, name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    for snapshot in &found {
        println!(
            "{:<16} {}",
            snapshot.kind.to_string().cyan(),
            snapshot.path
        );
    }
    if found.is_empty() {
        println!("{}", "No matching elements".yellow());
    }
    Ok(())
}

fn cmd_validate(file: &Path, strict: bool) -> Result<()> {
    let source = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?
    };

    let checked = if strict {
        validate_strict(&source)
    } else {
        validate_syntax(&source)
    };

    match checked {
        Ok(()) => {
            println!("{} {}", "✓".green(), "Valid".green());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            std::process::exit(1);
        }
    }
}
