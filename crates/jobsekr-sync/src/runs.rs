//! Run records: opened when a job starts, finalized exactly once.

use jobsekr_core::RunStatus;
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{RunLedger, RunTotals, StoreError};

/// An open run record. `complete` and `fail` consume the handle, so a run
/// cannot be finalized twice through it.
#[derive(Debug)]
#[must_use = "an open run must be completed or failed"]
pub struct RunHandle {
    id: Uuid,
    source: String,
}

impl RunHandle {
    pub async fn start<L>(ledger: &L, source: &str, config: JsonValue) -> Result<Self, StoreError>
    where
        L: RunLedger + ?Sized,
    {
        let id = ledger.start_run(source, config).await?;
        info!(run_id = %id, source, "run started");
        Ok(Self {
            id,
            source: source.to_string(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub async fn complete<L>(self, ledger: &L, totals: RunTotals) -> Result<(), StoreError>
    where
        L: RunLedger + ?Sized,
    {
        ledger.finish_run(self.id, totals, RunStatus::Completed).await?;
        info!(
            run_id = %self.id,
            source = %self.source,
            total_found = totals.total_found,
            new_found = totals.new_found,
            errors = totals.errors,
            "run completed"
        );
        Ok(())
    }

    /// Best effort: a ledger failure here is logged, since the caller is
    /// already propagating the error that failed the run.
    pub async fn fail<L>(self, ledger: &L, totals: RunTotals)
    where
        L: RunLedger + ?Sized,
    {
        match ledger.finish_run(self.id, totals, RunStatus::Failed).await {
            Ok(()) => warn!(run_id = %self.id, source = %self.source, "run failed"),
            Err(err) => warn!(run_id = %self.id, error = %err, "could not record failed run"),
        }
    }
}
