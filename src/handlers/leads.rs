use super::reject_body;
use crate::db_types::{Lead, LeadChanges, LeadKey, LeadType, LeadWithCalls, NewLead, UpsertSummary};
use crate::error::AppError;
use crate::owner::OwnerId;
use crate::types::{ApiResponse, AppState};
use crate::utils::non_empty;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Deserialize, Debug)]
pub struct BulkLeadsRequest {
    /// Entries are decoded one by one so a malformed entry is skipped, not fatal.
    #[serde(default)]
    pub leads: Option<Vec<Value>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeadInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "type")]
    pub lead_type: Option<String>,
}

fn parse_lead_type(raw: Option<String>) -> Result<Option<LeadType>, ()> {
    match non_empty(raw) {
        None => Ok(None),
        Some(raw) => raw.to_lowercase().parse::<LeadType>().map(Some).map_err(|_| ()),
    }
}

impl LeadInput {
    /// `None` when the entry can't be stored.
    fn from_entry(entry: Value) -> Option<NewLead> {
        serde_json::from_value::<LeadInput>(entry)
            .ok()?
            .into_new_lead()
    }

    fn into_new_lead(self) -> Option<NewLead> {
        Some(NewLead {
            name: non_empty(self.name)?,
            phone_number: non_empty(self.phone_number)?,
            email: non_empty(self.email),
            address: non_empty(self.address),
            lead_type: parse_lead_type(self.lead_type).ok()?,
        })
    }

    fn into_changes(self) -> Result<LeadChanges, AppError> {
        let lead_type = parse_lead_type(self.lead_type)
            .map_err(|_| AppError::bad_request("type must be buyer or seller"))?;
        Ok(LeadChanges {
            name: non_empty(self.name),
            email: non_empty(self.email),
            address: non_empty(self.address),
            phone_number: non_empty(self.phone_number),
            lead_type,
        })
    }
}

pub async fn bulk_create_leads(
    State(app_state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    payload: Result<Json<BulkLeadsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UpsertSummary>>, AppError> {
    const REQUIRED: &str = "leads array is required";

    let Json(body) = payload.map_err(|e| reject_body(e, REQUIRED))?;
    let entries = body.leads.unwrap_or_default();
    if entries.is_empty() {
        return Err(AppError::bad_request(REQUIRED));
    }

    let total = entries.len();
    let leads: Vec<NewLead> = entries
        .into_iter()
        .filter_map(LeadInput::from_entry)
        .collect();
    let skipped = (total - leads.len()) as u64;
    if skipped > 0 {
        debug!(skipped, "skipping invalid lead entries");
    }

    let mut summary = app_state
        .store
        .upsert_leads(owner, &leads)
        .await
        .map_err(|e| AppError::internal("Failed to save leads", e))?;
    summary.skipped_count = skipped;
    info!(owner=%owner, ?summary, "bulk lead upsert");

    let message = format!("Successfully saved {} leads", summary.saved());
    Ok(Json(ApiResponse::data(summary).with_message(message)))
}

pub async fn get_leads(
    State(app_state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
) -> Result<Json<ApiResponse<Vec<LeadWithCalls>>>, AppError> {
    let leads = app_state
        .store
        .leads_with_calls(owner)
        .await
        .map_err(|e| AppError::internal("Failed to fetch leads", e))?;
    Ok(Json(ApiResponse::data(leads)))
}

pub async fn update_lead(
    State(app_state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    Path(id_or_phone): Path<String>,
    payload: Result<Json<LeadInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Lead>>, AppError> {
    let Some(raw_key) = non_empty(Some(id_or_phone)) else {
        return Err(AppError::bad_request("Phone number or ID is required"));
    };
    let Json(body) = payload.map_err(|e| reject_body(e, "Invalid lead update"))?;
    let changes = body.into_changes()?;
    let key = LeadKey::parse(&raw_key);

    let lead = app_state
        .store
        .update_lead(owner, &key, &changes)
        .await
        .map_err(|e| AppError::from_store("Failed to update lead", e))?
        .ok_or_else(|| {
            debug!(owner=%owner, key=?key, "no lead to update");
            AppError::not_found("Lead not found")
        })?;

    info!(lead_id=%lead.id, "lead updated");
    Ok(Json(
        ApiResponse::data(lead).with_message("Lead updated successfully"),
    ))
}

pub async fn delete_lead(
    State(app_state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    Path(id_or_phone): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let Some(raw_key) = non_empty(Some(id_or_phone)) else {
        return Err(AppError::bad_request("Phone number or ID is required"));
    };
    let key = LeadKey::parse(&raw_key);

    let deleted = app_state
        .store
        .delete_lead(owner, &key)
        .await
        .map_err(|e| AppError::internal("Failed to delete lead", e))?;
    if !deleted {
        return Err(AppError::not_found("Lead not found"));
    }

    info!(owner=%owner, key=?key, "lead deleted");
    Ok(Json(ApiResponse::message("Lead deleted successfully")))
}
