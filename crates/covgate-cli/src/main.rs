//! covgate - build verification CLI
//!
//! Runs test suites under coverage instrumentation, merges their execution
//! data and gates the build on coverage thresholds.
//!
//! ## Commands
//!
//! - `run`: execute build targets (`check`, `fullRun`, ...)
//! - `tasks`: list targets with their group and dependencies
//! - `classify`: label version strings as stable or unstable
//! - `config`: validate or print the resolved configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use covgate_ci::{BuildGate, BuildPipeline, RunSpec};
use covgate_core::{is_stable, load_config, Executor, TaskStatus};

#[derive(Parser)]
#[command(name = "covgate")]
#[command(author = "Stevedores Org")]
#[command(version = covgate_core::VERSION)]
#[command(about = "Build verification: test suites, merged coverage and quality gates", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "COVGATE_CONFIG", default_value = "covgate.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute build targets and their dependencies
    Run {
        /// Targets to run, e.g. `check` or `fullRun`
        #[arg(required = true)]
        targets: Vec<String>,

        /// Maximum number of tasks running at once
        #[arg(short, long, default_value_t = 1)]
        parallel: usize,

        /// Print the execution plan without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List available targets
    Tasks,

    /// Classify version strings as stable or unstable
    Classify {
        #[arg(required = true)]
        versions: Vec<String>,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the configuration
    Check,

    /// Print the resolved configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    covgate_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            targets,
            parallel,
            dry_run,
        } => cmd_run(&cli.config, &targets, parallel, dry_run).await,
        Commands::Tasks => cmd_tasks(&cli.config),
        Commands::Classify { versions } => {
            cmd_classify(&versions);
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Check => cmd_config_check(&cli.config),
            ConfigAction::Show => cmd_config_show(&cli.config),
        },
    }
}

fn load_pipeline(config_path: &Path) -> Result<BuildPipeline> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    BuildPipeline::new(config)
}

async fn cmd_run(
    config_path: &Path,
    targets: &[String],
    parallel: usize,
    dry_run: bool,
) -> Result<()> {
    let pipeline = load_pipeline(config_path)?;

    if dry_run {
        let plan = pipeline.plan(targets)?;
        println!("Execution plan for: {}", targets.join(" "));
        for (pos, step) in plan.steps.iter().enumerate() {
            if step.after.is_empty() {
                println!("  {}. {}", pos + 1, step.name);
            } else {
                println!("  {}. {} (after {})", pos + 1, step.name, step.after.join(", "));
            }
        }
        return Ok(());
    }

    info!(config = %config_path.display(), "Running targets");
    let result = pipeline
        .run(targets, Executor::new(parallel))
        .await
        .context("Build run failed to start")?;

    for notice in &result.notices {
        println!("{}", notice);
    }
    if !result.notices.is_empty() {
        println!();
    }

    println!("Run ID: {}", result.run_id);
    println!("Run spec: {}", run_spec_line(&result.spec));
    println!("Status: {}", if result.success { "✓ PASSED" } else { "✗ FAILED" });
    println!("Duration: {}ms", result.duration_ms);
    println!();

    for task in &result.report.results {
        let mark = match task.status {
            TaskStatus::Succeeded => "✓",
            TaskStatus::Failed => "✗",
            TaskStatus::Skipped => "-",
        };
        println!("  {} {} ({}, {}ms)", mark, task.name, task.status, task.duration_ms);
    }

    println!();
    println!(
        "Summary: {}/{} tasks passed",
        result.passed_count(),
        result.report.results.len()
    );

    let verdict = BuildGate::evaluate(&result.report);
    if !verdict.violations.is_empty() {
        println!("Violations:");
        for violation in &verdict.violations {
            println!("  - {}", violation);
        }
    }

    if result.success && verdict.passed {
        let locations = pipeline.config().report_locations();
        if result.report.get("mergedReport").is_some() {
            for path in locations.all() {
                println!("Report: {}", path.display());
            }
        }
        Ok(())
    } else {
        anyhow::bail!("{}", verdict.message)
    }
}

/// Short run digest plus the scheduled tasks, e.g. `3f2a9c01b7de (primarySuite, check)`.
fn run_spec_line(spec: &RunSpec) -> String {
    format!("{} ({})", spec.short_digest(), spec.tasks.join(", "))
}

fn cmd_tasks(config_path: &Path) -> Result<()> {
    let pipeline = load_pipeline(config_path)?;
    let mut current_group: Option<&str> = None;

    let mut tasks: Vec<_> = pipeline.graph().tasks().collect();
    tasks.sort_by_key(|t| t.group.clone());

    for task in tasks {
        let group = task.group.as_deref().unwrap_or("other");
        if current_group != Some(group) {
            println!();
            println!("{} tasks", group);
            println!("{}", "-".repeat(group.len() + 6));
            current_group = Some(group);
        }
        println!("{} - {}", task.name, task.description);
        if !task.depends_on().is_empty() {
            println!("    depends on: {}", task.depends_on().join(", "));
        }
        if !task.should_run_after().is_empty() {
            println!("    runs after: {}", task.should_run_after().join(", "));
        }
        if !task.finalized_by().is_empty() {
            println!("    finalized by: {}", task.finalized_by().join(", "));
        }
    }
    Ok(())
}

fn cmd_classify(versions: &[String]) {
    for version in versions {
        let label = if is_stable(version) { "stable" } else { "unstable" };
        println!("{}\t{}", version, label);
    }
}

fn cmd_config_check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if config_path.exists() {
        println!("✓ {} is valid", config_path.display());
    } else {
        println!("✓ {} not found, defaults are valid", config_path.display());
    }
    println!("Digest: {}", config.digest()?);
    Ok(())
}

fn cmd_config_show(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    print!("{}", config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_parses_targets_and_flags() {
        let cli = Cli::try_parse_from(["covgate", "run", "check", "summary", "--parallel", "2"])
            .expect("parse");
        match cli.command {
            Commands::Run {
                targets,
                parallel,
                dry_run,
            } => {
                assert_eq!(targets, vec!["check", "summary"]);
                assert_eq!(parallel, 2);
                assert!(!dry_run);
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.config, PathBuf::from("covgate.toml"));
    }

    #[test]
    fn test_run_requires_a_target() {
        assert!(Cli::try_parse_from(["covgate", "run"]).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("covgate.toml");
        cmd_run(&missing, &["check".to_string()], 1, true)
            .await
            .expect("dry run");
    }

    #[test]
    fn test_run_spec_line_shows_short_digest_and_tasks() {
        let pipeline = BuildPipeline::new(covgate_core::BuildConfig::default()).expect("pipeline");
        let targets = vec!["check".to_string()];
        let plan = pipeline.plan(&targets).expect("plan");
        let spec = RunSpec::new(pipeline.config(), &targets, &plan).expect("spec");

        let line = run_spec_line(&spec);
        assert!(line.starts_with(spec.short_digest()));
        assert!(line.ends_with("thresholdVerification, check)"), "{line}");
    }

    #[test]
    fn test_config_check_rejects_invalid_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("covgate.toml");
        std::fs::write(&path, "[[rules]]\ncounter = \"LINE\"\nvalue = \"COVEREDRATIO\"\n")
            .expect("write");
        assert!(cmd_config_check(&path).is_err());
    }
}
