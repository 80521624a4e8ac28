//! Command implementations
//!
//! Each command loads the config, wires an orchestrator and prints the
//! result. Failures come back as `anyhow` errors; an `UpdateError` inside
//! carries the status code `main` reports.

use crate::cli::{Cli, Commands};
use crate::output;
use anyhow::{Context, Result};
use patchwise_common::{
    FileCache, MemoryCache, UpdateOptions, UpdateOrchestrator, UpdateSummary, UpdaterConfig,
};
use std::path::Path;
use tracing::{debug, info};

/// Load the config file and apply command-line overrides
pub fn load_config(path: &Path, current_version: Option<&str>) -> Result<UpdaterConfig> {
    let mut config = UpdaterConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(version) = current_version {
        debug!("Current version overridden to {}", version);
        config.current_version = version.to_string();
        config.validate()?;
    }
    Ok(config)
}

/// Production orchestrator; the catalog cache lives on disk when `cache_dir` is set
pub fn build_orchestrator(config: UpdaterConfig) -> Result<UpdateOrchestrator> {
    let builder = match config.cache_dir.clone() {
        Some(dir) => {
            debug!("Using catalog cache in {}", dir.display());
            UpdateOrchestrator::builder(config).cache(FileCache::new(dir))
        }
        None => UpdateOrchestrator::builder(config).cache(MemoryCache::default()),
    };
    builder.build().context("Failed to set up updater")
}

pub fn run(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config, cli.current_version.as_deref())?;
    let mut orchestrator = build_orchestrator(config)?;

    match &cli.command {
        Commands::Check => check(&mut orchestrator, cli.json),
        Commands::Simulate => update(
            &mut orchestrator,
            UpdateOptions {
                simulate: true,
                delete_staged: false,
            },
            cli.json,
        ),
        Commands::Update { keep_staged } => update(
            &mut orchestrator,
            UpdateOptions {
                simulate: false,
                delete_staged: !keep_staged,
            },
            cli.json,
        ),
    }
}

pub fn check(orchestrator: &mut UpdateOrchestrator, json: bool) -> Result<()> {
    let plan = orchestrator.check_update()?;

    if json {
        output::print_json(&output::plan_json(plan))
    } else {
        output::print_plan(plan);
        Ok(())
    }
}

pub fn update(orchestrator: &mut UpdateOrchestrator, options: UpdateOptions, json: bool) -> Result<()> {
    if !json && !options.simulate {
        orchestrator.on_version_applied(|version, _| {
            info!("Version {} installed", version);
            Ok(())
        });
    }

    let (summary, result) = UpdateSummary::capture(orchestrator, options);

    if json {
        output::print_json(&summary)?;
    } else {
        for report in orchestrator.simulation_reports() {
            output::print_simulation(report);
        }
        for (version, report) in orchestrator.install_reports() {
            output::print_install(version, report);
        }
        output::print_summary(&summary);
    }

    result.map(|_| ()).map_err(anyhow::Error::from)
}
