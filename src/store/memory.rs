use super::{Store, StoreError};
use crate::db_types::{
    BatchCall, BatchCallStatus, Call, CallOutcome, ContactUpsert, Lead, LeadChanges, LeadKey,
    LeadWithCalls, NewBatchCall, NewCall, NewLead, UpsertSummary,
};

use async_trait::async_trait;
use sqlx::types::time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    // insertion order; listings reverse it for newest first
    leads: Vec<Lead>,
    calls: Vec<Call>,
    batch_calls: Vec<BatchCall>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_lead(owner: Uuid, name: String, email: Option<String>, phone_number: String) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        name,
        email,
        phone_number,
        user_id: owner,
        address: None,
        lead_type: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_leads(
        &self,
        owner: Uuid,
        leads: &[NewLead],
    ) -> Result<UpsertSummary, StoreError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let mut summary = UpsertSummary::default();
        for entry in leads {
            let existing = tables
                .leads
                .iter_mut()
                .find(|l| l.user_id == owner && l.phone_number == entry.phone_number);
            match existing {
                Some(lead) => {
                    summary.matched_count += 1;
                    let before = lead.clone();
                    lead.name = entry.name.clone();
                    if entry.email.is_some() {
                        lead.email = entry.email.clone();
                    }
                    if entry.address.is_some() {
                        lead.address = entry.address.clone();
                    }
                    if entry.lead_type.is_some() {
                        lead.lead_type = entry.lead_type;
                    }
                    if *lead != before {
                        summary.modified_count += 1;
                    }
                }
                None => {
                    let mut lead = new_lead(
                        owner,
                        entry.name.clone(),
                        entry.email.clone(),
                        entry.phone_number.clone(),
                    );
                    lead.address = entry.address.clone();
                    lead.lead_type = entry.lead_type;
                    tables.leads.push(lead);
                    summary.upserted_count += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn upsert_contact(
        &self,
        owner: Uuid,
        contact: &ContactUpsert,
    ) -> Result<Lead, StoreError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        if let Some(lead) = tables
            .leads
            .iter_mut()
            .find(|l| l.user_id == owner && l.phone_number == contact.phone_number)
        {
            if let Some(name) = &contact.name {
                lead.name = name.clone();
            }
            if contact.email.is_some() {
                lead.email = contact.email.clone();
            }
            return Ok(lead.clone());
        }
        let name = contact
            .name
            .clone()
            .unwrap_or_else(|| contact.phone_number.clone());
        let lead = new_lead(
            owner,
            name,
            contact.email.clone(),
            contact.phone_number.clone(),
        );
        tables.leads.push(lead.clone());
        Ok(lead)
    }

    async fn leads_with_calls(&self, owner: Uuid) -> Result<Vec<LeadWithCalls>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .leads
            .iter()
            .rev()
            .filter(|l| l.user_id == owner)
            .map(|lead| LeadWithCalls {
                lead: lead.clone(),
                calls: tables
                    .calls
                    .iter()
                    .rev()
                    .filter(|c| c.lead_id == lead.id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    async fn update_lead(
        &self,
        owner: Uuid,
        key: &LeadKey,
        changes: &LeadChanges,
    ) -> Result<Option<Lead>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(idx) = tables
            .leads
            .iter()
            .position(|l| l.user_id == owner && key.matches(l))
        else {
            return Ok(None);
        };
        if let Some(phone) = &changes.phone_number {
            let taken = tables.leads.iter().enumerate().any(|(i, l)| {
                i != idx && l.user_id == owner && l.phone_number == *phone
            });
            if taken {
                return Err(StoreError::Conflict(
                    "a lead with this phone number already exists".to_string(),
                ));
            }
        }
        let lead = &mut tables.leads[idx];
        if let Some(name) = &changes.name {
            lead.name = name.clone();
        }
        if changes.email.is_some() {
            lead.email = changes.email.clone();
        }
        if changes.address.is_some() {
            lead.address = changes.address.clone();
        }
        if let Some(phone) = &changes.phone_number {
            lead.phone_number = phone.clone();
        }
        if changes.lead_type.is_some() {
            lead.lead_type = changes.lead_type;
        }
        Ok(Some(lead.clone()))
    }

    async fn delete_lead(&self, owner: Uuid, key: &LeadKey) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.leads.len();
        tables
            .leads
            .retain(|l| !(l.user_id == owner && key.matches(l)));
        Ok(tables.leads.len() < before)
    }

    async fn insert_call(&self, call: &NewCall) -> Result<Call, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.calls.iter().any(|c| c.call_id == call.call_id) {
            return Err(StoreError::Conflict("call already recorded".to_string()));
        }
        let record = Call {
            id: Uuid::new_v4(),
            call_id: call.call_id.clone(),
            lead_id: call.lead_id,
            status: call.status.clone(),
            analysis: None,
            transcript: None,
            recording_url: None,
            duration_ms: None,
            cost: None,
            from_number: call.from_number.clone(),
            to_number: call.to_number.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.calls.push(record.clone());
        Ok(record)
    }

    async fn find_call(&self, call_id: &str) -> Result<Option<Call>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.calls.iter().find(|c| c.call_id == call_id).cloned())
    }

    async fn update_call_outcome(
        &self,
        call_id: &str,
        outcome: &CallOutcome,
    ) -> Result<Option<Call>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(call) = tables.calls.iter_mut().find(|c| c.call_id == call_id) else {
            return Ok(None);
        };
        call.status = outcome.status.clone();
        call.analysis = outcome.analysis.clone();
        call.transcript = outcome.transcript.clone();
        call.recording_url = outcome.recording_url.clone();
        call.duration_ms = outcome.duration_ms;
        call.cost = outcome.cost;
        if outcome.from_number.is_some() {
            call.from_number = outcome.from_number.clone();
        }
        if outcome.to_number.is_some() {
            call.to_number = outcome.to_number.clone();
        }
        Ok(Some(call.clone()))
    }

    async fn insert_batch_call(&self, batch: &NewBatchCall) -> Result<BatchCall, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .batch_calls
            .iter()
            .any(|b| b.batch_call_id == batch.batch_call_id)
        {
            return Err(StoreError::Conflict(
                "batch call already recorded".to_string(),
            ));
        }
        let record = BatchCall {
            id: Uuid::new_v4(),
            batch_call_id: batch.batch_call_id.clone(),
            user_id: batch.owner_id,
            agent_id: batch.agent_id.clone(),
            expected_calls: batch.lead_ids.len() as i32,
            calls_done: 0,
            status: BatchCallStatus::Pending,
            lead_ids: batch.lead_ids.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.batch_calls.push(record.clone());
        Ok(record)
    }

    async fn batch_calls(&self, owner: Uuid) -> Result<Vec<BatchCall>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .batch_calls
            .iter()
            .rev()
            .filter(|b| b.user_id == owner)
            .cloned()
            .collect())
    }
}
