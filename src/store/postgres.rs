use super::{Store, StoreError};
use crate::db_types::{
    BatchCall, Call, CallOutcome, ContactUpsert, Lead, LeadChanges, LeadKey, LeadWithCalls,
    NewBatchCall, NewCall, NewLead, UpsertSummary,
};

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

const UPSERT_LEAD: &str = "
    insert into leads (
      id,
      owner_id,
      name,
      email,
      phone_number,
      address,
      lead_type
    ) values (
      $1,
      $2,
      $3,
      $4,
      $5,
      $6,
      $7
    )
    on conflict (owner_id, phone_number) do update set
      name = excluded.name,
      email = coalesce(excluded.email, leads.email),
      address = coalesce(excluded.address, leads.address),
      lead_type = coalesce(excluded.lead_type, leads.lead_type)
    where (leads.name, leads.email, leads.address, leads.lead_type) is distinct from (
      excluded.name,
      coalesce(excluded.email, leads.email),
      coalesce(excluded.address, leads.address),
      coalesce(excluded.lead_type, leads.lead_type)
    )
    returning (xmax = 0) as inserted
    ";

const UPSERT_CONTACT: &str = "
    insert into leads (
      id,
      owner_id,
      name,
      email,
      phone_number
    ) values (
      $1,
      $2,
      coalesce($3, $5),
      $4,
      $5
    )
    on conflict (owner_id, phone_number) do update set
      name = coalesce($3, leads.name),
      email = coalesce($4, leads.email)
    returning *
    ";

const UPDATE_LEAD_SET: &str = "
    update leads set
      name = coalesce($3, name),
      email = coalesce($4, email),
      address = coalesce($5, address),
      phone_number = coalesce($6, phone_number),
      lead_type = coalesce($7, lead_type)
    ";

pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_leads(
        &self,
        owner: Uuid,
        leads: &[NewLead],
    ) -> Result<UpsertSummary, StoreError> {
        let mut summary = UpsertSummary::default();
        let mut tx = self.pool.begin().await?;
        for lead in leads {
            // None: row existed and nothing changed
            let inserted = sqlx::query_scalar::<_, bool>(UPSERT_LEAD)
                .bind(Uuid::new_v4())
                .bind(owner)
                .bind(&lead.name)
                .bind(&lead.email)
                .bind(&lead.phone_number)
                .bind(&lead.address)
                .bind(lead.lead_type.map(|t| t.as_str()))
                .fetch_optional(&mut *tx)
                .await?;
            match inserted {
                Some(true) => summary.upserted_count += 1,
                Some(false) => {
                    summary.matched_count += 1;
                    summary.modified_count += 1;
                }
                None => summary.matched_count += 1,
            }
        }
        tx.commit().await?;
        debug!(?summary, "bulk lead upsert");
        Ok(summary)
    }

    async fn upsert_contact(
        &self,
        owner: Uuid,
        contact: &ContactUpsert,
    ) -> Result<Lead, StoreError> {
        let lead = sqlx::query_as::<_, Lead>(UPSERT_CONTACT)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&contact.name)
            .bind(&contact.email)
            .bind(&contact.phone_number)
            .fetch_one(&self.pool)
            .await?;
        Ok(lead)
    }

    async fn leads_with_calls(&self, owner: Uuid) -> Result<Vec<LeadWithCalls>, StoreError> {
        let leads = sqlx::query_as::<_, Lead>(
            "
            select *
            from leads
            where owner_id = $1
            order by created_at desc
            ",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let lead_ids: Vec<Uuid> = leads.iter().map(|l| l.id).collect();
        let calls = sqlx::query_as::<_, Call>(
            "
            select *
            from calls
            where lead_id = any($1)
            order by created_at desc
            ",
        )
        .bind(&lead_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut calls_by_lead: HashMap<Uuid, Vec<Call>> = HashMap::new();
        for call in calls {
            calls_by_lead.entry(call.lead_id).or_default().push(call);
        }
        Ok(leads
            .into_iter()
            .map(|lead| {
                let calls = calls_by_lead.remove(&lead.id).unwrap_or_default();
                LeadWithCalls { lead, calls }
            })
            .collect())
    }

    async fn update_lead(
        &self,
        owner: Uuid,
        key: &LeadKey,
        changes: &LeadChanges,
    ) -> Result<Option<Lead>, StoreError> {
        let sql = match key {
            LeadKey::Id(_) => {
                format!("{UPDATE_LEAD_SET} where owner_id = $1 and id = $2 returning *")
            }
            LeadKey::Phone(_) => {
                format!("{UPDATE_LEAD_SET} where owner_id = $1 and phone_number = $2 returning *")
            }
        };
        let query = sqlx::query_as::<_, Lead>(&sql).bind(owner);
        let query = match key {
            LeadKey::Id(id) => query.bind(*id),
            LeadKey::Phone(phone) => query.bind(phone.as_str()),
        };
        query
            .bind(&changes.name)
            .bind(&changes.email)
            .bind(&changes.address)
            .bind(&changes.phone_number)
            .bind(changes.lead_type.map(|t| t.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_write(e, "a lead with this phone number already exists"))
    }

    async fn delete_lead(&self, owner: Uuid, key: &LeadKey) -> Result<bool, StoreError> {
        let result = match key {
            LeadKey::Id(id) => {
                sqlx::query("delete from leads where owner_id = $1 and id = $2")
                    .bind(owner)
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            LeadKey::Phone(phone) => {
                sqlx::query("delete from leads where owner_id = $1 and phone_number = $2")
                    .bind(owner)
                    .bind(phone)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    async fn insert_call(&self, call: &NewCall) -> Result<Call, StoreError> {
        sqlx::query_as::<_, Call>(
            "
            insert into calls (
              id,
              call_id,
              lead_id,
              status,
              from_number,
              to_number
            ) values (
              $1,
              $2,
              $3,
              $4,
              $5,
              $6
            )
            returning *
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&call.call_id)
        .bind(call.lead_id)
        .bind(&call.status)
        .bind(&call.from_number)
        .bind(&call.to_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, "call already recorded"))
    }

    async fn find_call(&self, call_id: &str) -> Result<Option<Call>, StoreError> {
        let call = sqlx::query_as::<_, Call>("select * from calls where call_id = $1")
            .bind(call_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(call)
    }

    async fn update_call_outcome(
        &self,
        call_id: &str,
        outcome: &CallOutcome,
    ) -> Result<Option<Call>, StoreError> {
        let call = sqlx::query_as::<_, Call>(
            "
            update calls set
              status = $2,
              analysis = $3,
              transcript = $4,
              recording_url = $5,
              duration_ms = $6,
              cost = $7,
              from_number = coalesce($8, from_number),
              to_number = coalesce($9, to_number)
            where call_id = $1
            returning *
            ",
        )
        .bind(call_id)
        .bind(&outcome.status)
        .bind(&outcome.analysis)
        .bind(&outcome.transcript)
        .bind(&outcome.recording_url)
        .bind(outcome.duration_ms)
        .bind(outcome.cost)
        .bind(&outcome.from_number)
        .bind(&outcome.to_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(call)
    }

    async fn insert_batch_call(&self, batch: &NewBatchCall) -> Result<BatchCall, StoreError> {
        sqlx::query_as::<_, BatchCall>(
            "
            insert into batch_calls (
              id,
              batch_call_id,
              owner_id,
              agent_id,
              expected_calls,
              lead_ids
            ) values (
              $1,
              $2,
              $3,
              $4,
              $5,
              $6
            )
            returning *
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&batch.batch_call_id)
        .bind(batch.owner_id)
        .bind(&batch.agent_id)
        .bind(batch.lead_ids.len() as i32)
        .bind(&batch.lead_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, "batch call already recorded"))
    }

    async fn batch_calls(&self, owner: Uuid) -> Result<Vec<BatchCall>, StoreError> {
        let batches = sqlx::query_as::<_, BatchCall>(
            "
            select *
            from batch_calls
            where owner_id = $1
            order by created_at desc
            ",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }
}
