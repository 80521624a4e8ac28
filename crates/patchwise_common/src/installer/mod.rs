//! Package installer
//!
//! Handles one update package at a time:
//! 1. download it into the staging directory
//! 2. simulate the install (dry run, report per entry), or
//! 3. extract it into the install directory and run its embedded script
//!
//! No step retries. Nothing is rolled back.

pub mod extract;
pub mod paths;
pub mod simulate;

pub use extract::{InstallReport, ScriptOutcome};
pub use simulate::{SimulationEntry, SimulationReport};

use crate::config::{UpdaterConfig, DEFAULT_SCRIPT_NAME};
use crate::script::{CommandScriptRunner, ScriptRunner};
use crate::transport::{HttpTransport, TransportError};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::ZipArchive;

/// Archive errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("cannot open package {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot create folder {}: {source}", .path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings shared by simulate and install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Entry name treated as the post-install script
    pub script_name: String,
    /// Mode for created folders (Unix only)
    pub dir_mode: u32,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
            dir_mode: 0o755,
        }
    }
}

impl InstallOptions {
    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self {
            script_name: config.script_name.clone(),
            dir_mode: config.dir_mode,
        }
    }
}

pub(crate) fn open_archive(package: &Path) -> Result<ZipArchive<File>, ArchiveError> {
    let open_err = |source| ArchiveError::Open {
        path: package.to_path_buf(),
        source,
    };
    let file = File::open(package).map_err(|e| open_err(e.into()))?;
    ZipArchive::new(file).map_err(open_err)
}

/// Download a package to `dest`.
///
/// An empty body counts as a failed transfer. A partial file is removed.
pub fn download_package(
    transport: &dyn HttpTransport,
    url: &str,
    bearer: Option<&str>,
    dest: &Path,
) -> Result<u64, TransportError> {
    info!("Downloading {} to {}", url, dest.display());

    let result = match transport.download(url, bearer, dest) {
        Ok(0) => Err(TransportError::Empty {
            url: url.to_string(),
        }),
        other => other,
    };

    match result {
        Ok(bytes) => {
            info!("Downloaded {} bytes from {}", bytes, url);
            Ok(bytes)
        }
        Err(e) => {
            if dest.exists() {
                if let Err(rm_err) = fs::remove_file(dest) {
                    warn!("Failed to remove partial download {}: {}", dest.display(), rm_err);
                }
            }
            Err(e)
        }
    }
}

/// Simulates or installs packages with a fixed set of options
pub struct PackageInstaller {
    options: InstallOptions,
    runner: Box<dyn ScriptRunner>,
}

impl PackageInstaller {
    pub fn new(options: InstallOptions, runner: Box<dyn ScriptRunner>) -> Self {
        Self { options, runner }
    }

    pub fn simulate_install(
        &self,
        package: &Path,
        install_dir: &Path,
    ) -> Result<SimulationReport, ArchiveError> {
        simulate::simulate(package, install_dir, &self.options)
    }

    pub fn install(
        &self,
        package: &Path,
        install_dir: &Path,
    ) -> Result<InstallReport, ArchiveError> {
        extract::install(package, install_dir, &self.options, self.runner.as_ref())
    }
}

impl Default for PackageInstaller {
    fn default() -> Self {
        Self::new(InstallOptions::default(), Box::new(CommandScriptRunner))
    }
}
