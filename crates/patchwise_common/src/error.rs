//! Update status codes and orchestrator errors

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::installer::ArchiveError;
use crate::transport::TransportError;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Closed set of update results reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    NoUpdateAvailable,
    VersionCheckError,
    TempDirError,
    InstallDirError,
    DownloadError,
    DeleteTempUpdateError,
    SimulateError,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoUpdateAvailable => "NoUpdateAvailable",
            Self::VersionCheckError => "VersionCheckError",
            Self::TempDirError => "TempDirError",
            Self::InstallDirError => "InstallDirError",
            Self::DownloadError => "DownloadError",
            Self::DeleteTempUpdateError => "DeleteTempUpdateError",
            Self::SimulateError => "SimulateError",
        }
    }

    /// Everything except `NoUpdateAvailable`
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::NoUpdateAvailable)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of an update cycle, one variant per failure mode
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("version check failed: {0}")]
    VersionCheck(#[from] CatalogError),

    #[error("staging directory {} is unusable: {reason}", .path.display())]
    TempDir { path: PathBuf, reason: String },

    #[error("install directory {} is unusable: {reason}", .path.display())]
    InstallDir { path: PathBuf, reason: String },

    #[error("download of {version} from {url} failed: {source}")]
    Download {
        version: Version,
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to delete staged package {}: {source}", .path.display())]
    DeleteTemp {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("simulation of {version} found {blocking} blocking entries")]
    Simulate { version: Version, blocking: usize },

    #[error("simulation of {version} could not read the package: {source}")]
    SimulateArchive {
        version: Version,
        #[source]
        source: ArchiveError,
    },

    #[error("install of {version} failed: {source}")]
    Install {
        version: Version,
        #[source]
        source: ArchiveError,
    },

    #[error("update hook failed: {0:#}")]
    Hook(anyhow::Error),
}

impl UpdateError {
    /// Status code for this failure; install and hook failures have none
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::VersionCheck(_) => Some(StatusCode::VersionCheckError),
            Self::TempDir { .. } => Some(StatusCode::TempDirError),
            Self::InstallDir { .. } => Some(StatusCode::InstallDirError),
            Self::Download { .. } => Some(StatusCode::DownloadError),
            Self::DeleteTemp { .. } => Some(StatusCode::DeleteTempUpdateError),
            Self::Simulate { .. } | Self::SimulateArchive { .. } => {
                Some(StatusCode::SimulateError)
            }
            Self::Install { .. } | Self::Hook(_) => None,
        }
    }

    /// Status code name, or "Failed" for plain failures
    pub fn status_label(&self) -> &'static str {
        self.status().map(|s| s.as_str()).unwrap_or("Failed")
    }
}

/// Successful end of an update cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    NoUpdateAvailable,
    Applied {
        versions: Vec<Version>,
        simulated: bool,
    },
}

impl UpdateOutcome {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::NoUpdateAvailable => Some(StatusCode::NoUpdateAvailable),
            Self::Applied { .. } => None,
        }
    }

    pub fn applied(&self) -> &[Version] {
        match self {
            Self::NoUpdateAvailable => &[],
            Self::Applied { versions, .. } => versions,
        }
    }
}

/// Orchestrator construction errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot create HTTP transport: {0}")]
    Transport(#[from] TransportError),
}
