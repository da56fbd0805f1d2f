//! CLI command definitions for pipewright.
//!
//! Four commands cover the envelope: `build` produces the image, `run`
//! launches it and propagates the exit status, `check` validates descriptor
//! and manifest offline, `inspect` reads back what a build recorded.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use crate::build::{BuildRequest, ImageBuilder};
use crate::descriptor::BuildDescriptor;
use crate::docker::DockerClient;
use crate::error::{BuildError, LaunchError};
use crate::launch::{failure_exit_code, inspect_image, LaunchOptions, Launcher};
use crate::manifest::Manifest;

/// Default tag for the pipeline image.
const DEFAULT_IMAGE_TAG: &str = "pipeline:latest";

/// Build and launch pipeline container images.
#[derive(Parser)]
#[command(name = "pipewright")]
#[command(about = "Reproducible build-and-launch envelope for pipeline containers")]
#[command(version)]
#[command(
    long_about = "pipewright builds an immutable container image from a build context and a\n\
dependency manifest, and launches its recorded entrypoint as the single\n\
foreground process of a container, propagating the exit status.\n\n\
Example usage:\n  \
pipewright build --context . --tag pipeline:latest\n  \
pipewright run --image pipeline:latest"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Build the pipeline image from a build context.
    #[command(alias = "b")]
    Build(BuildArgs),

    /// Launch the pipeline image and propagate its exit status.
    ///
    /// The container runs the image's recorded command with no arguments,
    /// from the working directory established at build time, with output
    /// streamed unbuffered. This process exits with the container's exit
    /// code.
    #[command(alias = "r")]
    Run(RunArgs),

    /// Validate the build descriptor and dependency manifest offline.
    Check(CheckArgs),

    /// Show the entrypoint, working directory, and labels a build recorded.
    Inspect(InspectArgs),
}

/// Arguments for `pipewright build`.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Build context directory.
    #[arg(short = 'c', long, default_value = ".")]
    pub context: PathBuf,

    /// Build descriptor file (defaults to pipewright.yaml in the context,
    /// or built-in defaults when absent).
    #[arg(short = 'd', long)]
    pub descriptor: Option<PathBuf>,

    /// Tag to apply to the built image.
    #[arg(short = 't', long, default_value = DEFAULT_IMAGE_TAG)]
    pub tag: String,

    /// Override the base image reference.
    #[arg(long)]
    pub base_image: Option<String>,

    /// Override the manifest path (relative to the context root).
    #[arg(long)]
    pub manifest: Option<String>,

    /// Override the working directory inside the image.
    #[arg(long)]
    pub workdir: Option<String>,

    /// Override the entrypoint command.
    #[arg(long, num_args = 1.., value_name = "ARG", allow_hyphen_values = true)]
    pub entrypoint: Vec<String>,

    /// Output the build report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `pipewright run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Image to launch.
    #[arg(short = 'i', long, default_value = DEFAULT_IMAGE_TAG)]
    pub image: String,

    /// Container name (a unique one is generated when absent).
    #[arg(long)]
    pub name: Option<String>,

    /// Keep the exited container instead of removing it.
    #[arg(long)]
    pub keep: bool,
}

/// Arguments for `pipewright check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Build context directory.
    #[arg(short = 'c', long, default_value = ".")]
    pub context: PathBuf,

    /// Build descriptor file (defaults to pipewright.yaml in the context).
    #[arg(short = 'd', long)]
    pub descriptor: Option<PathBuf>,

    /// Output the check report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `pipewright inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Image to inspect.
    #[arg(short = 'i', long, default_value = DEFAULT_IMAGE_TAG)]
    pub image: String,

    /// Output the report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before
/// running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<i32> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// Returns the process exit code: for `run` this is the launched
/// container's own exit status.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Build(args) => run_build_command(args).await,
        Commands::Run(args) => run_run_command(args).await,
        Commands::Check(args) => run_check_command(args),
        Commands::Inspect(args) => run_inspect_command(args).await,
    }
}

/// Resolves the descriptor for a context and applies CLI overrides.
fn resolve_descriptor(
    context: &Path,
    explicit: Option<&Path>,
    base_image: Option<String>,
    manifest: Option<String>,
    workdir: Option<String>,
    entrypoint: Vec<String>,
) -> anyhow::Result<BuildDescriptor> {
    let mut descriptor = BuildDescriptor::resolve(context, explicit)?;
    if let Some(image) = base_image {
        descriptor = descriptor.with_base_image(image);
    }
    if let Some(path) = manifest {
        descriptor = descriptor.with_manifest_path(path);
    }
    if let Some(dir) = workdir {
        descriptor = descriptor.with_workdir(dir);
    }
    if !entrypoint.is_empty() {
        descriptor = descriptor.with_entrypoint(entrypoint);
    }
    descriptor.validate()?;
    Ok(descriptor)
}

async fn run_build_command(args: BuildArgs) -> anyhow::Result<i32> {
    let descriptor = resolve_descriptor(
        &args.context,
        args.descriptor.as_deref(),
        args.base_image,
        args.manifest,
        args.workdir,
        args.entrypoint,
    )?;

    let client = DockerClient::connect()
        .map_err(|e| BuildError::DaemonUnavailable(format!("Failed to connect: {e}")))?;
    let builder = ImageBuilder::new(client);

    let request = BuildRequest::new(args.context, args.tag).with_descriptor(descriptor);
    let output = builder.build(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Built {}", output.image_tag);
        if let Some(id) = &output.image_id {
            println!("  image id:     {id}");
        }
        println!("  context:      {} files", output.file_count);
        println!("  digest:       {}", output.context_digest);
        println!("  requirements: {}", output.requirement_count);
    }

    Ok(0)
}

async fn run_run_command(args: RunArgs) -> anyhow::Result<i32> {
    let client = DockerClient::connect()
        .map_err(|e| LaunchError::DaemonUnavailable(format!("Failed to connect: {e}")))?;

    let mut options = LaunchOptions::new(args.image).with_keep_container(args.keep);
    if let Some(name) = args.name {
        options = options.with_container_name(name);
    }

    let mut launcher = Launcher::new(client, options);
    match launcher.launch().await {
        // The container's exit code becomes ours, zero or not.
        Ok(code) => Ok(code as i32),
        Err(e) => {
            error!(error = %e, "Launch failed");
            Ok(failure_exit_code(&e))
        }
    }
}

/// JSON report for `pipewright check`.
#[derive(Debug, Serialize)]
struct CheckOutput {
    descriptor: BuildDescriptor,
    requirement_count: usize,
    requirements: Vec<String>,
}

fn run_check_command(args: CheckArgs) -> anyhow::Result<i32> {
    let descriptor = BuildDescriptor::resolve(&args.context, args.descriptor.as_deref())?;

    let manifest_file = args.context.join(&descriptor.manifest_path);
    let manifest = Manifest::from_file(&manifest_file)?;

    info!(
        context = %args.context.display(),
        manifest = %descriptor.manifest_path,
        requirements = manifest.len(),
        "Descriptor and manifest are valid"
    );

    if args.json {
        let output = CheckOutput {
            requirement_count: manifest.len(),
            requirements: manifest.requirements.iter().map(|r| r.to_string()).collect(),
            descriptor,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("ok: descriptor and manifest are valid");
        println!("  base image: {}", descriptor.base_image);
        println!("  workdir:    {}", descriptor.workdir);
        println!("  entrypoint: {}", descriptor.entrypoint.join(" "));
        println!("  manifest:   {}", descriptor.manifest_path);
        for requirement in &manifest.requirements {
            println!("    {requirement}");
        }
    }

    Ok(0)
}

async fn run_inspect_command(args: InspectArgs) -> anyhow::Result<i32> {
    let client = DockerClient::connect()
        .map_err(|e| LaunchError::DaemonUnavailable(format!("Failed to connect: {e}")))?;

    let report = inspect_image(&client, &args.image).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.image);
        if let Some(id) = &report.id {
            println!("  id:          {id}");
        }
        println!("  cmd:         {}", report.cmd.join(" "));
        if !report.entrypoint.is_empty() {
            println!("  entrypoint:  {}", report.entrypoint.join(" "));
        }
        if let Some(workdir) = &report.working_dir {
            println!("  working dir: {workdir}");
        }
        if let Some(digest) = report.context_digest() {
            println!("  digest:      {digest}");
        }
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_build_args() {
        let cli = Cli::parse_from([
            "pipewright",
            "build",
            "--context",
            "/tmp/ctx",
            "--tag",
            "pipeline:v2",
            "--base-image",
            "python:3.12-slim",
        ]);

        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.context, PathBuf::from("/tmp/ctx"));
                assert_eq!(args.tag, "pipeline:v2");
                assert_eq!(args.base_image.as_deref(), Some("python:3.12-slim"));
                assert!(args.entrypoint.is_empty());
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn test_cli_parses_entrypoint_override() {
        let cli = Cli::parse_from([
            "pipewright",
            "build",
            "--entrypoint",
            "python",
            "-u",
            "main.py",
        ]);

        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.entrypoint, vec!["python", "-u", "main.py"]);
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn test_cli_run_defaults() {
        let cli = Cli::parse_from(["pipewright", "run"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.image, DEFAULT_IMAGE_TAG);
                assert!(args.name.is_none());
                assert!(!args.keep);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_resolve_descriptor_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = resolve_descriptor(
            dir.path(),
            None,
            Some("alpine:3.20".to_string()),
            Some("deps.txt".to_string()),
            Some("/srv".to_string()),
            vec!["sh".to_string(), "-c".to_string(), "true".to_string()],
        )
        .unwrap();

        assert_eq!(descriptor.base_image, "alpine:3.20");
        assert_eq!(descriptor.manifest_path, "deps.txt");
        assert_eq!(descriptor.workdir, "/srv");
        assert_eq!(descriptor.entrypoint, vec!["sh", "-c", "true"]);
    }

    #[test]
    fn test_resolve_descriptor_rejects_bad_override() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_descriptor(
            dir.path(),
            None,
            None,
            None,
            Some("relative/dir".to_string()),
            Vec::new(),
        );
        assert!(result.is_err());
    }
}
