use anyhow::Context;
use backdate_cli::config::{self, PathOverrides};
use backdate_core::adapters::{FsHeadSource, FsWritePort, load_manifest};
use backdate_core::run::{GenerateOutcome, ToolError, check_outputs, run_generate, write_outputs};
use backdate_core::settings::GenerateSettings;
use backdate_domain::{GraphPoint, VersionChange, VersionGraph};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "backdate",
    version,
    about = "Generate every historical version of an API schema from HEAD."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write every version's modules and the generation report.
    Generate(GenerateArgs),
    /// Verify generated output is up to date (exit 2 if stale).
    Check(CheckArgs),
    /// Print a unified diff between two versions (either may be HEAD).
    Diff(DiffArgs),
    /// Show which version a token resolves to.
    Resolve(ResolveArgs),
    /// List versions and the changes each one introduced.
    ListChanges(ListChangesArgs),
}

#[derive(Debug, Args)]
struct PathArgs {
    /// Project root holding backdate.toml (default: current directory).
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,

    /// Directory of HEAD modules (default: <root>/schemas/head).
    #[arg(long)]
    head: Option<Utf8PathBuf>,

    /// Versions manifest, TOML or JSON (default: <root>/versions.toml).
    #[arg(long)]
    versions: Option<Utf8PathBuf>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    paths: PathArgs,

    /// Output directory (default: <root>/schemas/generated).
    #[arg(long)]
    out: Option<Utf8PathBuf>,

    /// Omit the do-not-edit banner from generated modules.
    #[arg(long, default_value_t = false)]
    no_banner: bool,
}

#[derive(Debug, Parser)]
struct CheckArgs {
    #[command(flatten)]
    paths: PathArgs,

    /// Output directory to verify (default: <root>/schemas/generated).
    #[arg(long)]
    out: Option<Utf8PathBuf>,
}

#[derive(Debug, Parser)]
struct DiffArgs {
    #[command(flatten)]
    paths: PathArgs,

    /// Version to diff from.
    #[arg(long)]
    from: String,

    /// Version to diff to.
    #[arg(long)]
    to: String,
}

#[derive(Debug, Parser)]
struct ResolveArgs {
    /// Version token as a client would send it.
    token: String,

    #[command(flatten)]
    paths: PathArgs,
}

#[derive(Debug, Parser)]
struct ListChangesArgs {
    #[command(flatten)]
    paths: PathArgs,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::from(0),
        Err(ToolError::Stale(files)) => {
            for file in &files {
                println!("stale: {} ({})", file.path, file.reason);
            }
            error!("{} generated file(s) are stale; run `backdate generate`", files.len());
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn real_main() -> Result<(), ToolError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args)?,
        Command::Check(args) => cmd_check(args)?,
        Command::Diff(args) => cmd_diff(args)?,
        Command::Resolve(args) => cmd_resolve(args)?,
        Command::ListChanges(args) => cmd_list_changes(args)?,
    }
    Ok(())
}

fn settings(
    paths: &PathArgs,
    out: Option<Utf8PathBuf>,
    no_banner: bool,
) -> anyhow::Result<GenerateSettings> {
    let file_config = config::load_or_default(&paths.root).context("load backdate.toml config")?;
    let overrides = PathOverrides {
        head: paths.head.clone(),
        versions: paths.versions.clone(),
        out,
        no_banner,
    };
    let merged = config::merge(&paths.root, &file_config, &overrides);
    debug!(
        head = %merged.head_dir,
        versions = %merged.versions_file,
        out = %merged.out_dir,
        banner = merged.banner,
        "merged config"
    );
    Ok(merged)
}

fn generate_from(settings: &GenerateSettings) -> anyhow::Result<GenerateOutcome> {
    let manifest = load_manifest(&settings.versions_file)?;
    let head = FsHeadSource::new(settings.head_dir.clone());
    run_generate(&head, &manifest, settings.banner)
}

fn load_graph(settings: &GenerateSettings) -> anyhow::Result<VersionGraph> {
    let manifest = load_manifest(&settings.versions_file)?;
    VersionGraph::from_manifest(&manifest)
        .with_context(|| format!("build version graph from {}", settings.versions_file))
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let settings = settings(&args.paths, args.out, args.no_banner)?;
    let outcome = generate_from(&settings)?;
    write_outputs(&outcome, &settings.out_dir, &FsWritePort)?;
    info!(
        versions = outcome.generated.versions().len(),
        files = outcome.files.len(),
        "wrote generated schemas to {}",
        settings.out_dir
    );
    Ok(())
}

fn cmd_check(args: CheckArgs) -> Result<(), ToolError> {
    // Banner comes from the config file; it is part of the expected bytes.
    let settings = settings(&args.paths, args.out, false)?;
    let outcome = generate_from(&settings)?;
    let stale = check_outputs(&outcome, &settings.out_dir)?;
    if !stale.is_empty() {
        return Err(ToolError::Stale(stale));
    }
    info!("{} is up to date", settings.out_dir);
    Ok(())
}

fn cmd_diff(args: DiffArgs) -> anyhow::Result<()> {
    let settings = settings(&args.paths, None, true)?;
    let outcome = generate_from(&settings)?;
    let generated = &outcome.generated;
    for version in [&args.from, &args.to] {
        if generated.sources(version).is_none() {
            let known: Vec<String> = generated
                .versions()
                .iter()
                .map(|v| v.id().to_string())
                .collect();
            anyhow::bail!(
                "unknown version `{}`; known versions: {}, HEAD",
                version,
                known.join(", ")
            );
        }
    }
    let patch = generated
        .patch_between(&args.from, &args.to)
        .unwrap_or_default();
    if patch.is_empty() {
        info!("no differences between {} and {}", args.from, args.to);
    }
    print!("{}", patch);
    Ok(())
}

fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<()> {
    let settings = settings(&args.paths, None, true)?;
    let graph = load_graph(&settings)?;
    let resolved = graph
        .resolve(&args.token)
        .with_context(|| format!("resolve `{}`", args.token))?;
    let how = if resolved.exact { "exact" } else { "waterfall" };
    println!("{} -> {} ({})", resolved.requested, resolved.id, how);
    Ok(())
}

fn cmd_list_changes(args: ListChangesArgs) -> anyhow::Result<()> {
    let settings = settings(&args.paths, None, true)?;
    let graph = load_graph(&settings)?;

    let mut points: Vec<GraphPoint> = (0..graph.len()).map(GraphPoint::Version).collect();
    if !graph.head_changes().is_empty() {
        points.push(GraphPoint::Head);
    }

    match args.format {
        OutputFormat::Text => {
            println!("Versions ({} scheme), oldest first:\n", graph.scheme());
            for point in points {
                println!("{}", graph.label(point));
                for change in graph.changes_at(point) {
                    print_change(change);
                }
            }
        }
        OutputFormat::Json => {
            let versions: Vec<_> = points
                .into_iter()
                .map(|point| {
                    let changes: Vec<_> = graph
                        .changes_at(point)
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "name": c.name(),
                                "description": c.description(),
                                "side_effects": c.has_side_effects(),
                                "instructions": c.instructions(),
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "version": graph.label(point),
                        "changes": changes,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&versions)?);
        }
    }
    Ok(())
}

fn print_change(change: &VersionChange) {
    let marker = if change.has_side_effects() {
        " [side effects]"
    } else {
        ""
    };
    println!("  {}{}", change.name(), marker);
    if !change.description().is_empty() && change.description() != change.name() {
        println!("    {}", change.description());
    }
    for instruction in change.instructions() {
        println!("    - {}", instruction);
    }
}
