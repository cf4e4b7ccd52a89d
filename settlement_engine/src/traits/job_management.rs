use crate::{
    db_types::{Job, JobApplication},
    traits::LedgerError,
};

/// Access to the marketplace's job and application records.
///
/// Jobs are managed elsewhere in the marketplace; the upsert methods exist so that those records can be mirrored into
/// the ledger's database.
#[allow(async_fn_in_trait)]
pub trait JobManagement {
    async fn fetch_job(&self, job_id: &str) -> Result<Option<Job>, LedgerError>;

    async fn fetch_application(&self, application_id: &str) -> Result<Option<JobApplication>, LedgerError>;

    async fn upsert_job(&self, job: Job) -> Result<Job, LedgerError>;

    async fn upsert_application(&self, application: JobApplication) -> Result<JobApplication, LedgerError>;
}
