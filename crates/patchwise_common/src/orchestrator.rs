//! Update orchestration
//!
//! Drives one update cycle:
//! Idle -> Checking -> Planning -> Installing[i] -> Finished,
//! or Failed(status) from any step.
//!
//! Versions are applied strictly one at a time in ascending order. A failure
//! halts the sequence; versions applied before it stay applied.

use crate::cache::{CatalogCache, MemoryCache};
use crate::callbacks::CallbackDispatcher;
use crate::catalog::{CatalogEntry, CatalogFetcher, CatalogRequest};
use crate::config::UpdaterConfig;
use crate::error::{BuildError, StatusCode, UpdateError, UpdateOutcome};
use crate::installer::paths::is_writable;
use crate::installer::{
    download_package, ArchiveError, InstallOptions, InstallReport, PackageInstaller, ScriptOutcome,
    SimulationReport,
};
use crate::planner::{self, UpdatePlan};
use crate::script::{CommandScriptRunner, ScriptRunner};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::version::Version;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where the orchestrator is in its cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Checking,
    Planning,
    Installing { index: usize, version: Version },
    Finished,
    /// `None` for failures outside the status code set
    Failed(Option<StatusCode>),
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Checking => write!(f, "checking"),
            Self::Planning => write!(f, "planning"),
            Self::Installing { index, version } => write!(f, "installing #{} ({})", index, version),
            Self::Finished => write!(f, "finished"),
            Self::Failed(Some(code)) => write!(f, "failed ({})", code),
            Self::Failed(None) => write!(f, "failed"),
        }
    }
}

/// Per-cycle switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Dry run every package instead of installing it
    pub simulate: bool,
    /// Remove each staged package once it has been handled
    pub delete_staged: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            simulate: false,
            delete_staged: true,
        }
    }
}

/// Injects collaborators; anything left unset gets the production default
pub struct UpdateOrchestratorBuilder {
    config: UpdaterConfig,
    transport: Option<Box<dyn HttpTransport>>,
    cache: Option<Box<dyn CatalogCache>>,
    script_runner: Option<Box<dyn ScriptRunner>>,
}

impl UpdateOrchestratorBuilder {
    pub fn transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn cache(mut self, cache: impl CatalogCache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn script_runner(mut self, runner: impl ScriptRunner + 'static) -> Self {
        self.script_runner = Some(Box::new(runner));
        self
    }

    pub fn build(self) -> Result<UpdateOrchestrator, BuildError> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(ReqwestTransport::new(
                self.config.verify_tls,
                self.config.request_timeout(),
            )?),
        };
        let cache = self
            .cache
            .unwrap_or_else(|| Box::new(MemoryCache::default()));
        let runner = self
            .script_runner
            .unwrap_or_else(|| Box::new(CommandScriptRunner));
        let installer = PackageInstaller::new(InstallOptions::from_config(&self.config), runner);

        debug!("Orchestrator configured: {:?}", self.config);

        Ok(UpdateOrchestrator {
            config: self.config,
            transport,
            cache,
            installer,
            callbacks: CallbackDispatcher::new(),
            state: CycleState::Idle,
            plan: None,
            applied: Vec::new(),
            simulations: Vec::new(),
            installs: Vec::new(),
        })
    }
}

pub struct UpdateOrchestrator {
    config: UpdaterConfig,
    transport: Box<dyn HttpTransport>,
    cache: Box<dyn CatalogCache>,
    installer: PackageInstaller,
    callbacks: CallbackDispatcher,
    state: CycleState,
    plan: Option<UpdatePlan>,
    applied: Vec<Version>,
    simulations: Vec<SimulationReport>,
    installs: Vec<(Version, InstallReport)>,
}

impl UpdateOrchestrator {
    pub fn builder(config: UpdaterConfig) -> UpdateOrchestratorBuilder {
        UpdateOrchestratorBuilder {
            config,
            transport: None,
            cache: None,
            script_runner: None,
        }
    }

    /// Orchestrator with the production transport, cache and script runner
    pub fn new(config: UpdaterConfig) -> Result<Self, BuildError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn plan(&self) -> Option<&UpdatePlan> {
        self.plan.as_ref()
    }

    /// Versions applied (or simulated) by the current or last cycle
    pub fn applied_versions(&self) -> &[Version] {
        &self.applied
    }

    pub fn last_simulation(&self) -> Option<&SimulationReport> {
        self.simulations.last()
    }

    /// Every simulation report of the last simulated cycle, in plan order
    pub fn simulation_reports(&self) -> &[SimulationReport] {
        &self.simulations
    }

    /// Install report per package of the last real cycle, in plan order
    pub fn install_reports(&self) -> &[(Version, InstallReport)] {
        &self.installs
    }

    pub fn on_version_applied<F>(&mut self, hook: F)
    where
        F: FnMut(&Version, bool) -> anyhow::Result<()> + Send + 'static,
    {
        self.callbacks.register_per_version(hook);
    }

    pub fn on_all_finished<F>(&mut self, hook: F)
    where
        F: FnMut(&[Version]) -> anyhow::Result<()> + Send + 'static,
    {
        self.callbacks.register_all_finished(hook);
    }

    /// Fetch the catalog and replace the current plan
    pub fn check_update(&mut self) -> Result<&UpdatePlan, UpdateError> {
        self.state = CycleState::Checking;
        self.plan = None;

        let current = self.config.current_version();
        info!("Checking for updates (current version {})", current);

        let request = CatalogRequest::from_config(&self.config);
        let fetched = CatalogFetcher::new(self.transport.as_ref(), self.cache.as_ref()).fetch(&request);
        let catalog = match fetched {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Version check failed: {}", e);
                self.state = CycleState::Failed(Some(StatusCode::VersionCheckError));
                return Err(e.into());
            }
        };

        self.state = CycleState::Planning;
        let plan = planner::plan(&catalog, &current);
        if plan.new_version_available() {
            info!(
                "Latest version is {} ({} pending)",
                plan.latest_version(),
                plan.len()
            );
        } else {
            info!("No version newer than {} is available", current);
        }
        Ok(&*self.plan.insert(plan))
    }

    pub fn new_version_available(&self) -> bool {
        self.plan
            .as_ref()
            .map(UpdatePlan::new_version_available)
            .unwrap_or(false)
    }

    /// Newest pending version, or the baseline before a check or when none
    pub fn latest_version(&self) -> Version {
        self.plan
            .as_ref()
            .map(|plan| plan.latest_version().clone())
            .unwrap_or_else(Version::baseline)
    }

    /// Stage the package for `entry`, reusing a previously staged copy
    pub fn download_update(&self, entry: &CatalogEntry) -> Result<PathBuf, UpdateError> {
        let staged = self.config.staged_package_path(&entry.version);

        if let Ok(meta) = fs::metadata(&staged) {
            if meta.is_file() && meta.len() > 0 {
                info!("Reusing staged package {}", staged.display());
                return Ok(staged);
            }
        }

        download_package(
            self.transport.as_ref(),
            &entry.download_url,
            self.config.access_token.as_deref(),
            &staged,
        )
        .map_err(|source| {
            error!("Download of {} failed: {}", entry.version, source);
            UpdateError::Download {
                version: entry.version.clone(),
                url: entry.download_url.clone(),
                source,
            }
        })?;
        Ok(staged)
    }

    /// Dry run `package` against the install directory; replaces the last report
    pub fn simulate_install(&mut self, package: &Path) -> Result<&SimulationReport, ArchiveError> {
        let report = self
            .installer
            .simulate_install(package, &self.config.install_dir)?;
        self.simulations.clear();
        self.simulations.push(report);
        Ok(&self.simulations[0])
    }

    pub fn install(&self, package: &Path) -> Result<InstallReport, ArchiveError> {
        self.installer.install(package, &self.config.install_dir)
    }

    /// Run a full cycle: check, plan, then apply every pending version
    pub fn update(&mut self, options: UpdateOptions) -> Result<UpdateOutcome, UpdateError> {
        self.applied.clear();
        self.simulations.clear();
        self.installs.clear();

        let result = self.run_cycle(options);
        if let Err(e) = &result {
            error!("Update failed [{}]: {}", e.status_label(), e);
            self.state = CycleState::Failed(e.status());
        }
        result
    }

    fn run_cycle(&mut self, options: UpdateOptions) -> Result<UpdateOutcome, UpdateError> {
        let plan = self.check_update()?.clone();

        if !plan.new_version_available() {
            self.state = CycleState::Finished;
            return Ok(UpdateOutcome::NoUpdateAvailable);
        }

        info!(
            "{} {} update(s): {}",
            if options.simulate { "Simulating" } else { "Applying" },
            plan.len(),
            plan.versions()
                .iter()
                .map(Version::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        for (index, entry) in plan.entries().iter().enumerate() {
            self.state = CycleState::Installing {
                index,
                version: entry.version.clone(),
            };
            self.apply_entry(entry, options)?;
        }

        self.callbacks
            .fire_all_finished(&self.applied)
            .map_err(UpdateError::Hook)?;
        self.state = CycleState::Finished;

        Ok(UpdateOutcome::Applied {
            versions: self.applied.clone(),
            simulated: options.simulate,
        })
    }

    fn apply_entry(&mut self, entry: &CatalogEntry, options: UpdateOptions) -> Result<(), UpdateError> {
        self.check_directories()?;
        let package = self.download_update(entry)?;

        if let Err(e) = self.apply_package(&entry.version, &package, options.simulate) {
            if options.delete_staged {
                discard_staged(&package);
            }
            return Err(e);
        }

        self.applied.push(entry.version.clone());
        info!(
            "{} version {}",
            if options.simulate { "Simulated" } else { "Applied" },
            entry.version
        );

        self.callbacks
            .fire_per_version(&entry.version, options.simulate)
            .map_err(UpdateError::Hook)?;

        if options.delete_staged {
            fs::remove_file(&package).map_err(|source| {
                error!("Cannot delete staged package {}: {}", package.display(), source);
                UpdateError::DeleteTemp {
                    path: package.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn apply_package(&mut self, version: &Version, package: &Path, simulate: bool) -> Result<(), UpdateError> {
        let install_dir = &self.config.install_dir;

        if simulate {
            let report = self
                .installer
                .simulate_install(package, install_dir)
                .map_err(|source| UpdateError::SimulateArchive {
                    version: version.clone(),
                    source,
                })?;
            for entry in report.blocking_entries() {
                warn!("{}: {} cannot be placed", version, entry.name);
            }
            let blocking = report.blocking_entries().count();
            self.simulations.push(report);

            if blocking > 0 {
                return Err(UpdateError::Simulate {
                    version: version.clone(),
                    blocking,
                });
            }
            return Ok(());
        }

        let report = self
            .installer
            .install(package, install_dir)
            .map_err(|source| UpdateError::Install {
                version: version.clone(),
                source,
            })?;
        if let Some(ScriptOutcome::Failed { message }) = &report.script {
            warn!("{}: post-install script failed: {}", version, message);
        }
        self.installs.push((version.clone(), report));
        Ok(())
    }

    fn check_directories(&self) -> Result<(), UpdateError> {
        check_directory(&self.config.staging_dir).map_err(|reason| UpdateError::TempDir {
            path: self.config.staging_dir.clone(),
            reason,
        })?;
        check_directory(&self.config.install_dir).map_err(|reason| UpdateError::InstallDir {
            path: self.config.install_dir.clone(),
            reason,
        })
    }
}

fn check_directory(path: &Path) -> Result<(), String> {
    let meta = fs::metadata(path).map_err(|e| e.to_string())?;
    if !meta.is_dir() {
        return Err("not a directory".to_string());
    }
    if !is_writable(path) {
        return Err("not writable".to_string());
    }
    Ok(())
}

fn discard_staged(package: &Path) {
    if let Err(e) = fs::remove_file(package) {
        warn!("Failed to remove staged package {}: {}", package.display(), e);
    }
}

impl fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("plan", &self.plan)
            .field("applied", &self.applied)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
