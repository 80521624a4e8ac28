//! Updater configuration
//!
//! Settings are fixed once the orchestrator is built. There are no setters;
//! a new cycle with different settings needs a new orchestrator.
//! Config file: ./patchwise.toml unless a path is given.

use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default catalog endpoint (Bitbucket downloads API)
pub const DEFAULT_ENDPOINT: &str =
    "https://api.bitbucket.org/2.0/repositories/{workspace}/{repo_slug}/downloads";

/// Default name of the post-install script shipped inside a package
pub const DEFAULT_SCRIPT_NAME: &str = "upgrade.sh";

/// Environment variable consulted when the file carries no access token
pub const ACCESS_TOKEN_ENV: &str = "PATCHWISE_ACCESS_TOKEN";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Updater settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Version currently installed
    pub current_version: String,

    /// Catalog URL template with `{workspace}` and `{repo_slug}` placeholders
    pub endpoint: String,

    pub workspace: String,
    pub repo_slug: String,

    /// Bearer token sent with every request
    pub access_token: Option<String>,

    /// Update channel; appended to the catalog URL as `.{branch}`
    pub branch: Option<String>,

    /// Verify TLS peer certificates and host names
    pub verify_tls: bool,

    /// Where downloaded packages are staged as `<version>.zip`
    pub staging_dir: PathBuf,

    /// Where packages are extracted
    pub install_dir: PathBuf,

    /// Package entry run as a post-install script
    pub script_name: String,

    /// Permission bits for directories created during install (Unix only)
    pub dir_mode: u32,

    pub cache_ttl_secs: u64,

    /// Overall timeout for a single HTTP request
    pub max_execution_secs: u64,

    /// Directory for the on-disk catalog cache; in-memory cache when unset
    pub cache_dir: Option<PathBuf>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            current_version: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            workspace: String::new(),
            repo_slug: String::new(),
            access_token: None,
            branch: None,
            verify_tls: true,
            staging_dir: std::env::temp_dir().join("patchwise-updates"),
            install_dir: PathBuf::from("."),
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
            dir_mode: 0o755,
            cache_ttl_secs: 3600,
            max_execution_secs: 60,
            cache_dir: None,
        }
    }
}

// Keeps the access token out of logs
impl fmt::Debug for UpdaterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdaterConfig")
            .field("current_version", &self.current_version)
            .field("endpoint", &self.endpoint)
            .field("workspace", &self.workspace)
            .field("repo_slug", &self.repo_slug)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("branch", &self.branch)
            .field("verify_tls", &self.verify_tls)
            .field("staging_dir", &self.staging_dir)
            .field("install_dir", &self.install_dir)
            .field("script_name", &self.script_name)
            .field("dir_mode", &format_args!("{:o}", self.dir_mode))
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("max_execution_secs", &self.max_execution_secs)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl UpdaterConfig {
    /// Default config path: ./patchwise.toml
    pub fn default_path() -> PathBuf {
        PathBuf::from("patchwise.toml")
    }

    /// Load and validate a TOML config file.
    ///
    /// Falls back to `PATCHWISE_ACCESS_TOKEN` when the file has no token.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml_str(&content)?;
        if config.access_token.is_none() {
            config.access_token = std::env::var(ACCESS_TOKEN_ENV)
                .ok()
                .filter(|token| !token.trim().is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config.normalized())
    }

    // Empty strings in the file mean "unset"
    fn normalized(mut self) -> Self {
        self.branch = self.branch.filter(|b| !b.trim().is_empty());
        self.access_token = self.access_token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.current_version.trim().is_empty() {
            return Err(ConfigError::Invalid("current_version is required".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint is required".to_string()));
        }
        if self.script_name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "script_name must be a bare file name, got {}",
                self.script_name
            )));
        }
        Ok(())
    }

    pub fn current_version(&self) -> Version {
        Version::new(self.current_version.trim())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.max_execution_secs)
    }

    /// Path a package for `version` is staged at
    pub fn staged_package_path(&self, version: &Version) -> PathBuf {
        self.staging_dir.join(format!("{}.zip", version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = UpdaterConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.script_name, "upgrade.sh");
        assert_eq!(config.dir_mode, 0o755);
        assert!(config.verify_tls);
        assert!(config.branch.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config = UpdaterConfig::from_toml_str(
            r#"
            current_version = "1.0"
            workspace = "acme"
            repo_slug = "widget"
            branch = "beta"
            install_dir = "/opt/widget"
            dir_mode = 448
            cache_ttl_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.current_version(), Version::new("1.0"));
        assert_eq!(config.branch.as_deref(), Some("beta"));
        assert_eq!(config.install_dir, PathBuf::from("/opt/widget"));
        assert_eq!(config.dir_mode, 0o700);
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        // untouched fields keep their defaults
        assert_eq!(config.max_execution_secs, 60);
    }

    #[test]
    fn test_empty_branch_and_token_are_unset() {
        let config = UpdaterConfig::from_toml_str(
            r#"
            current_version = "1.0"
            branch = ""
            access_token = "  "
            "#,
        )
        .unwrap();
        assert!(config.branch.is_none());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_validate_rejects_missing_version() {
        let config = UpdaterConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_script_path() {
        let config = UpdaterConfig {
            current_version: "1.0".to_string(),
            script_name: "bin/upgrade.sh".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_staged_package_path() {
        let config = UpdaterConfig {
            staging_dir: PathBuf::from("/tmp/stage"),
            ..Default::default()
        };
        assert_eq!(
            config.staged_package_path(&Version::new("1.2")),
            PathBuf::from("/tmp/stage/1.2.zip")
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = UpdaterConfig {
            access_token: Some("secret-token".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = UpdaterConfig::load(Path::new("/nonexistent/patchwise.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
