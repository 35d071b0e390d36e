//! Persistence for leads, calls and batch calls.
//!
//! Every lead write is keyed by (phone number, owner). `PgStore` is the
//! production backend; `MemoryStore` has the same semantics and backs local
//! runs without a database as well as the test suite.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::db_types::{
    BatchCall, Call, CallOutcome, ContactUpsert, Lead, LeadChanges, LeadKey, LeadWithCalls,
    NewBatchCall, NewCall, NewLead, UpsertSummary,
};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Unique violations become `Conflict`; everything else stays a database error.
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        if is_unique_violation(&err) {
            StoreError::Conflict(what.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Update-or-insert each entry in order. Unchanged rows count as matched only.
    async fn upsert_leads(&self, owner: Uuid, leads: &[NewLead])
        -> Result<UpsertSummary, StoreError>;

    /// Update-or-insert a single contact and return the stored lead.
    async fn upsert_contact(&self, owner: Uuid, contact: &ContactUpsert)
        -> Result<Lead, StoreError>;

    async fn leads_with_calls(&self, owner: Uuid) -> Result<Vec<LeadWithCalls>, StoreError>;

    async fn update_lead(
        &self,
        owner: Uuid,
        key: &LeadKey,
        changes: &LeadChanges,
    ) -> Result<Option<Lead>, StoreError>;

    /// Returns whether a lead was removed. Its calls are left in place.
    async fn delete_lead(&self, owner: Uuid, key: &LeadKey) -> Result<bool, StoreError>;

    async fn insert_call(&self, call: &NewCall) -> Result<Call, StoreError>;

    async fn find_call(&self, call_id: &str) -> Result<Option<Call>, StoreError>;

    async fn update_call_outcome(
        &self,
        call_id: &str,
        outcome: &CallOutcome,
    ) -> Result<Option<Call>, StoreError>;

    async fn insert_batch_call(&self, batch: &NewBatchCall) -> Result<BatchCall, StoreError>;

    async fn batch_calls(&self, owner: Uuid) -> Result<Vec<BatchCall>, StoreError>;
}
