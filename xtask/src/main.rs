use anyhow::Context;
use backdate_core::adapters::{FsHeadSource, FsWritePort, load_manifest};
use backdate_core::run::{run_generate, write_outputs};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use fs_err as fs;

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Workspace helper tasks")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print schema identifiers used by backdate.
    PrintSchemas,
    /// Bless golden fixtures (overwrite tests/fixtures/*/expected).
    BlessFixtures {
        /// Only bless the named fixture.
        #[arg(long)]
        only: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::PrintSchemas => {
            println!("{}", backdate_types::schema::BACKDATE_GENERATION_V1);
            println!("{}", backdate_types::schema::BACKDATE_VERSIONS_V1);
        }
        Command::BlessFixtures { only } => {
            let fixtures = workspace_root()?.join("tests").join("fixtures");
            let mut blessed = 0;
            for entry in fs::read_dir(&fixtures)? {
                let path = Utf8PathBuf::try_from(entry?.path()).context("fixture path is not UTF-8")?;
                if !path.join("versions.toml").exists() {
                    continue;
                }
                let name = path.file_name().unwrap_or_default();
                if only.as_deref().is_some_and(|o| o != name) {
                    continue;
                }
                bless(&path).with_context(|| format!("bless fixture {name}"))?;
                println!("blessed {name}");
                blessed += 1;
            }
            if blessed == 0 {
                anyhow::bail!("no fixtures matched under {fixtures}");
            }
        }
    }
    Ok(())
}

fn workspace_root() -> anyhow::Result<Utf8PathBuf> {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Utf8Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn bless(dir: &Utf8Path) -> anyhow::Result<()> {
    let manifest = load_manifest(&dir.join("versions.toml"))?;
    let outcome = run_generate(&FsHeadSource::new(dir.join("head")), &manifest, true)?;
    let expected = dir.join("expected");
    if expected.exists() {
        fs::remove_dir_all(&expected)?;
    }
    write_outputs(&outcome, &expected, &FsWritePort)
}
