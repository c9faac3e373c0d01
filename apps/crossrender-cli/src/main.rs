use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossrender_harness::RunConfig;
use crossrender_scene::{SceneOutline, SceneTemplate};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crossrender", about = "Render the same scene across renderers over a parameter sweep")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every backend at every sweep point
    Sweep {
        /// Run configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding renderer executables
        #[arg(long)]
        build_dir: Option<PathBuf>,
        /// Only run these backends (repeatable)
        #[arg(long)]
        only: Vec<String>,
        /// Skip tone-mapped PNG output
        #[arg(long)]
        no_png: bool,
    },
    /// Render one unmodified scene file with one backend
    Render {
        #[arg(short, long)]
        config: PathBuf,
        /// Backend id from the configuration
        #[arg(short, long)]
        backend: String,
        /// Scene file to render
        #[arg(short, long)]
        scene: PathBuf,
        #[arg(long)]
        build_dir: Option<PathBuf>,
    },
    /// Print a scene's nodes and parameter keys
    Inspect {
        #[arg(short, long)]
        scene: PathBuf,
    },
    /// Validate a configuration and list the artifacts a sweep would write
    Plan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        build_dir: Option<PathBuf>,
        #[arg(long)]
        only: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Sweep {
            config,
            build_dir,
            only,
            no_png,
        } => {
            let mut run = load_config(&config)?;
            if no_png {
                run.tonemapped = false;
            }
            let harness = run.harness(build_dir.as_deref())?.only(only);
            let sweep = run.sweep()?;
            let report = harness.run(&sweep)?;

            let report_path = harness.report_path();
            report.write_json(&report_path)?;

            println!(
                "{} artifacts written, {} failed (report: {})",
                report.artifacts.len(),
                report.failures.len(),
                report_path.display()
            );
            for failure in &report.failures {
                println!(
                    "  {} at {}: {} failed: {}",
                    failure.backend, failure.point, failure.stage, failure.error
                );
            }
            if !report.is_success() {
                bail!("{} of the sweep's renders failed", report.failures.len());
            }
        }
        Commands::Render {
            config,
            backend,
            scene,
            build_dir,
        } => {
            let run = load_config(&config)?;
            let image = run
                .render_single(&backend, &scene, build_dir.as_deref())
                .with_context(|| format!("rendering {} with `{backend}`", scene.display()))?;
            let stem = scene
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| backend.clone());
            let paths = run.artifact_manager().write_named(&image, &stem)?;
            println!("{}", paths.exr.display());
            if let Some(png) = paths.png {
                println!("{}", png.display());
            }
        }
        Commands::Inspect { scene } => {
            let template = SceneTemplate::load(&scene)
                .with_context(|| format!("loading {}", scene.display()))?;
            print!("{}", SceneOutline::of(&template));
        }
        Commands::Plan {
            config,
            build_dir,
            only,
        } => {
            let run = load_config(&config)?;
            let harness = run.harness(build_dir.as_deref())?.only(only);
            let sweep = run.sweep()?;
            let planned = harness.plan(&sweep)?;
            println!(
                "{} points, backends [{}], output {}",
                sweep.len(),
                harness.backend_ids().join(", "),
                harness.artifacts().output_dir().display()
            );
            for artifact in &planned {
                println!("  {}", artifact.name);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<RunConfig> {
    RunConfig::load(path).with_context(|| format!("loading run configuration {}", path.display()))
}
