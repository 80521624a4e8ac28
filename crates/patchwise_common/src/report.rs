//! Run summary for one update cycle

use crate::error::{StatusCode, UpdateError, UpdateOutcome};
use crate::orchestrator::{UpdateOptions, UpdateOrchestrator};
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a single `update` call did, serializable for `--json` output
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub current_version: Version,
    pub latest_version: Version,
    pub simulated: bool,
    pub applied: Vec<Version>,
    /// `applied`, a status code name, or `failed`
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateSummary {
    /// Run `update` and record the result alongside it
    pub fn capture(
        orchestrator: &mut UpdateOrchestrator,
        options: UpdateOptions,
    ) -> (Self, Result<UpdateOutcome, UpdateError>) {
        let started_at = Utc::now();
        let result = orchestrator.update(options);
        let summary = Self::from_result(started_at, orchestrator, options, &result);
        (summary, result)
    }

    pub fn from_result(
        started_at: DateTime<Utc>,
        orchestrator: &UpdateOrchestrator,
        options: UpdateOptions,
        result: &Result<UpdateOutcome, UpdateError>,
    ) -> Self {
        let (outcome, error) = match result {
            Ok(UpdateOutcome::Applied { .. }) => ("applied".to_string(), None),
            Ok(UpdateOutcome::NoUpdateAvailable) => {
                (StatusCode::NoUpdateAvailable.as_str().to_string(), None)
            }
            Err(e) => (e.status_label().to_string(), Some(e.to_string())),
        };

        Self {
            started_at,
            finished_at: Utc::now(),
            current_version: orchestrator.config().current_version(),
            latest_version: orchestrator.latest_version(),
            simulated: options.simulate,
            applied: orchestrator.applied_versions().to_vec(),
            outcome,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdaterConfig;
    use crate::transport::FakeTransport;

    const URL: &str = "https://api.example.com/2.0/repositories/acme/widget/downloads";

    fn orchestrator(transport: FakeTransport, dir: &std::path::Path) -> UpdateOrchestrator {
        let config = UpdaterConfig {
            current_version: "1.0".to_string(),
            endpoint: "https://api.example.com/2.0/repositories/{workspace}/{repo_slug}/downloads"
                .to_string(),
            workspace: "acme".to_string(),
            repo_slug: "widget".to_string(),
            staging_dir: dir.to_path_buf(),
            install_dir: dir.to_path_buf(),
            ..UpdaterConfig::default()
        };
        UpdateOrchestrator::builder(config)
            .transport(transport)
            .build()
            .unwrap()
    }

    #[test]
    fn test_summary_for_no_update() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new().with_body(URL, r#"{"values": []}"#);
        let mut orchestrator = orchestrator(transport, dir.path());

        let (summary, result) = UpdateSummary::capture(&mut orchestrator, UpdateOptions::default());
        assert!(result.is_ok());
        assert!(summary.is_success());
        assert_eq!(summary.outcome, StatusCode::NoUpdateAvailable.as_str());
        assert_eq!(summary.latest_version, Version::baseline());
        assert!(summary.finished_at >= summary.started_at);
    }

    #[test]
    fn test_summary_for_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new().with_status(URL, 401);
        let mut orchestrator = orchestrator(transport, dir.path());

        let (summary, result) = UpdateSummary::capture(&mut orchestrator, UpdateOptions::default());
        assert!(result.is_err());
        assert!(!summary.is_success());
        assert_eq!(summary.outcome, "VersionCheckError");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["current_version"], "1.0");
        assert!(json["error"].as_str().unwrap().contains("401"));
    }
}
