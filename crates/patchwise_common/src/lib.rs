//! Patchwise Common - update discovery and application
//!
//! Fetches a remote version catalog, plans the versions newer than the
//! installed one and applies their packages in ascending order, with a dry
//! run mode that checks filesystem preconditions first.

pub mod cache;
pub mod callbacks;
pub mod catalog;
pub mod config;
pub mod error;
pub mod installer;
pub mod orchestrator;
pub mod planner;
pub mod report;
pub mod script;
pub mod transport;
pub mod version;

pub use cache::{CatalogCache, FileCache, MemoryCache, CATALOG_CACHE_KEY};
pub use catalog::{Catalog, CatalogEntry, CatalogError, CatalogFetcher, CatalogRequest};
pub use config::{ConfigError, UpdaterConfig};
pub use error::{BuildError, StatusCode, UpdateError, UpdateOutcome};
pub use installer::{
    ArchiveError, InstallOptions, InstallReport, PackageInstaller, ScriptOutcome,
    SimulationEntry, SimulationReport,
};
pub use orchestrator::{CycleState, UpdateOptions, UpdateOrchestrator};
pub use planner::UpdatePlan;
pub use report::UpdateSummary;
pub use script::{CommandScriptRunner, ScriptRunner};
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
pub use version::Version;
