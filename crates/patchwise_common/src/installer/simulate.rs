//! Dry-run installation
//!
//! Walks every archive entry and predicts whether the real install could
//! place it. The only mutation allowed here is creating missing folders,
//! which doubles as the writability check for them. Files are never
//! created or touched.

use super::paths::{
    create_folder, is_writable, nearest_existing_ancestor, normalize_entry_name, resolve_target,
};
use super::{open_archive, ArchiveError, InstallOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prediction for one archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationEntry {
    pub name: String,
    pub target_folder: PathBuf,
    /// `None` for directory entries
    pub target_file: Option<PathBuf>,
    pub folder_existed: bool,
    pub folder_writable: bool,
    pub file_existed: bool,
    pub file_writable: bool,
    pub is_embedded_script: bool,
}

impl SimulationEntry {
    /// Entry that cannot be placed at all
    fn blocked(name: String, install_dir: &Path, is_embedded_script: bool) -> Self {
        Self {
            name,
            target_folder: install_dir.to_path_buf(),
            target_file: None,
            folder_existed: false,
            folder_writable: false,
            file_existed: false,
            file_writable: false,
            is_embedded_script,
        }
    }

    pub fn is_blocking(&self) -> bool {
        !(self.folder_writable && self.file_writable)
    }
}

/// Predictions for every entry of one package, in archive order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub package: PathBuf,
    pub install_dir: PathBuf,
    pub entries: Vec<SimulationEntry>,
}

impl SimulationReport {
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| !e.is_blocking())
    }

    pub fn blocking_entries(&self) -> impl Iterator<Item = &SimulationEntry> {
        self.entries.iter().filter(|e| e.is_blocking())
    }

    pub fn embedded_script(&self) -> Option<&SimulationEntry> {
        self.entries.iter().find(|e| e.is_embedded_script)
    }
}

/// Predict one entry, creating its folder when the parent allows it
pub(crate) fn simulate_entry(
    name: &str,
    install_dir: &Path,
    options: &InstallOptions,
) -> SimulationEntry {
    let name = normalize_entry_name(name);
    let is_embedded_script = name == options.script_name;

    let Some(target) = resolve_target(install_dir, &name) else {
        warn!("Entry {} would land outside {}", name, install_dir.display());
        return SimulationEntry::blocked(name, install_dir, is_embedded_script);
    };

    let folder_existed = target.folder.is_dir();
    let folder_writable = if folder_existed {
        is_writable(&target.folder)
    } else {
        let parent_writable = nearest_existing_ancestor(&target.folder)
            .map(|parent| parent.is_dir() && is_writable(parent))
            .unwrap_or(false);

        parent_writable
            && match create_folder(&target.folder, options.dir_mode) {
                Ok(()) => {
                    debug!("Created {} during simulation", target.folder.display());
                    true
                }
                Err(e) => {
                    debug!("Cannot create {}: {}", target.folder.display(), e);
                    false
                }
            }
    };

    let (file_existed, file_writable) = match &target.file {
        None => (false, true),
        Some(file) if file.exists() => (true, file.is_file() && is_writable(file)),
        Some(_) => (false, folder_writable),
    };

    SimulationEntry {
        name,
        target_folder: target.folder,
        target_file: target.file,
        folder_existed,
        folder_writable,
        file_existed,
        file_writable,
        is_embedded_script,
    }
}

/// Simulate installing `package` into `install_dir`.
///
/// Every entry is evaluated even after a blocking one so the report lists
/// all problems at once.
pub fn simulate(
    package: &Path,
    install_dir: &Path,
    options: &InstallOptions,
) -> Result<SimulationReport, ArchiveError> {
    let mut archive = open_archive(package)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let name = match archive.by_index(index) {
            Ok(entry) => entry.name().to_string(),
            Err(e) => {
                warn!("Cannot read entry #{} of {}: {}", index, package.display(), e);
                entries.push(SimulationEntry::blocked(
                    format!("#{}", index),
                    install_dir,
                    false,
                ));
                continue;
            }
        };
        entries.push(simulate_entry(&name, install_dir, options));
    }

    let report = SimulationReport {
        package: package.to_path_buf(),
        install_dir: install_dir.to_path_buf(),
        entries,
    };

    let blocking = report.blocking_entries().count();
    if blocking == 0 {
        info!(
            "Simulation of {} passed ({} entries)",
            package.display(),
            report.entries.len()
        );
    } else {
        warn!(
            "Simulation of {} found {} blocking entries",
            package.display(),
            blocking
        );
    }
    Ok(report)
}
