//! Package extraction
//!
//! Entries are placed in archive order. A folder that cannot be created
//! aborts the package; a single file that cannot be written is logged and
//! skipped. The embedded script runs as soon as it is extracted, then is
//! removed.

use super::paths::{create_folder, is_writable, normalize_entry_name, resolve_target};
use super::{open_archive, ArchiveError, InstallOptions};
use crate::script::ScriptRunner;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// What happened to the embedded script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOutcome {
    Succeeded,
    Failed { message: String },
}

/// Result of one package install
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Files written, by normalized entry name
    pub extracted: Vec<String>,
    /// Entries left out, with the reason
    pub skipped: Vec<(String, String)>,
    pub script: Option<ScriptOutcome>,
}

fn write_entry(reader: &mut impl Read, dest: &Path) -> io::Result<u64> {
    let mut file = File::create(dest)?;
    io::copy(reader, &mut file)
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)) {
            warn!("Failed to set permissions on {}: {}", path.display(), e);
        }
    }
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) {}

/// Extract `package` into `install_dir`
pub fn install(
    package: &Path,
    install_dir: &Path,
    options: &InstallOptions,
    runner: &dyn ScriptRunner,
) -> Result<InstallReport, ArchiveError> {
    let mut archive = open_archive(package)?;
    let mut report = InstallReport::default();
    info!("Installing {} into {}", package.display(), install_dir.display());

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry #{} of {}: {}", index, package.display(), e);
                report.skipped.push((format!("#{}", index), e.to_string()));
                continue;
            }
        };

        let name = normalize_entry_name(entry.name());
        let Some(target) = resolve_target(install_dir, &name) else {
            warn!("Skipping {}: outside {}", name, install_dir.display());
            report
                .skipped
                .push((name, "outside install directory".to_string()));
            continue;
        };

        if !target.folder.is_dir() {
            create_folder(&target.folder, options.dir_mode).map_err(|source| {
                error!("Cannot create {}: {}", target.folder.display(), source);
                ArchiveError::CreateFolder {
                    path: target.folder.clone(),
                    source,
                }
            })?;
        }

        let Some(file) = target.file else {
            continue;
        };

        // Same verdicts as the simulation: existing files by their own
        // permissions, new files by their folder's
        if file.exists() {
            if !is_writable(&file) {
                warn!("Skipping {}: {} is read-only", name, file.display());
                report.skipped.push((name, "target is read-only".to_string()));
                continue;
            }
        } else if !is_writable(&target.folder) {
            warn!("Skipping {}: {} is not writable", name, target.folder.display());
            report
                .skipped
                .push((name, "folder is not writable".to_string()));
            continue;
        }

        let unix_mode = entry.unix_mode();
        match write_entry(&mut entry, &file) {
            Ok(bytes) => debug!("Extracted {} ({} bytes)", name, bytes),
            Err(e) => {
                warn!("Failed to extract {} to {}: {}", name, file.display(), e);
                report.skipped.push((name, e.to_string()));
                continue;
            }
        }
        apply_unix_mode(&file, unix_mode);

        if name == options.script_name {
            report.script = Some(match runner.run(&file, install_dir) {
                Ok(()) => ScriptOutcome::Succeeded,
                Err(e) => {
                    error!("Post-install script {} failed: {}", file.display(), e);
                    ScriptOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            });
            if let Err(e) = fs::remove_file(&file) {
                warn!("Failed to delete post-install script {}: {}", file.display(), e);
            }
            continue;
        }

        report.extracted.push(name);
    }

    info!(
        "Installed {}: {} files, {} skipped",
        package.display(),
        report.extracted.len(),
        report.skipped.len()
    );
    Ok(report)
}
