//! Harvest, discovery and cleanup jobs over the company directory and job store.

use jobsekr_adapters::RegistryError;
use thiserror::Error;

pub mod classify;
pub mod config;
pub mod discovery;
pub mod harvest;
pub mod orchestrator;
pub mod pg;
pub mod reconcile;
pub mod runs;
pub mod store;

pub use config::{SourcesFile, SyncConfig, TextSource};
pub use discovery::{DiscoverOptions, Discovery, DiscoveryConfig, DiscoveryReport, ProbeEngine, ProbeMatch};
pub use harvest::{HarvestOptions, HarvestReport, Harvester};
pub use orchestrator::{JobKind, JobSummary, Orchestrator};
pub use pg::PgStore;
pub use reconcile::{CleanupEngine, CleanupPolicy, CleanupReport};
pub use store::{CompanyStore, JobStore, JobsekrStore, MemoryStore, RunLedger, RunTotals, StoreError};

pub const CRATE_NAME: &str = "jobsekr-sync";

/// Failures that abort a whole job. Per-target fetch failures never surface here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no eligible companies to harvest")]
    NoEligibleTargets,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
