use super::reject_body;
use crate::consts::REGISTERED_STATUS;
use crate::db_types::{BatchCall, ContactUpsert, NewBatchCall, NewCall};
use crate::error::AppError;
use crate::owner::OwnerId;
use crate::retell_types::{
    BatchCallResponse, BatchCallTask, CallResponse, CreateBatchCallRequest,
    CreatePhoneCallRequest,
};
use crate::types::{ApiResponse, AppState};
use crate::utils::{call_outcome, dynamic_variables, non_empty, stored_call_response};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CallLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub subject: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct BatchCallRequest {
    #[serde(default)]
    pub leads: Option<Vec<Value>>,
    #[serde(default)]
    pub trigger_timestamp: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
}

impl BatchCallRequest {
    /// Unix millis; absent or null means call now.
    fn trigger_timestamp(&self) -> Result<Option<i64>, AppError> {
        match &self.trigger_timestamp {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => raw.as_i64().map(Some).ok_or_else(|| {
                AppError::bad_request("trigger_timestamp must be an integer (unix milliseconds)")
            }),
        }
    }

    fn name(&self) -> Result<Option<String>, AppError> {
        match &self.name {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(name)) => Ok(non_empty(Some(name.clone()))),
            Some(_) => Err(AppError::bad_request("name must be a string")),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BatchLeadInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Upsert the lead, have the agent call them, and record the call.
pub async fn call_lead(
    State(app_state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    payload: Result<Json<CallLeadRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CallResponse>>, AppError> {
    const REQUIRED: &str = "name, email, and phoneNumber are required";
    const FAILED: &str = "Failed to initiate call";

    let Json(body) = payload.map_err(|e| reject_body(e, REQUIRED))?;
    let (Some(name), Some(email), Some(phone_number)) = (
        non_empty(body.name),
        non_empty(body.email),
        non_empty(body.phone_number),
    ) else {
        return Err(AppError::bad_request(REQUIRED));
    };
    let subject = body.subject.unwrap_or_default();

    let contact = ContactUpsert {
        name: Some(name.clone()),
        email: Some(email.clone()),
        phone_number: phone_number.clone(),
    };
    let lead = app_state
        .store
        .upsert_contact(owner, &contact)
        .await
        .map_err(|e| AppError::internal_with_detail(FAILED, e))?;

    let request = CreatePhoneCallRequest {
        from_number: app_state.from_number.clone(),
        to_number: phone_number.clone(),
        override_agent_id: Some(app_state.agent_id.clone()),
        retell_llm_dynamic_variables: dynamic_variables(&[
            ("name", Some(name.as_str())),
            ("email", Some(email.as_str())),
            ("phone_number", Some(phone_number.as_str())),
            ("subject", Some(subject.as_str())),
        ]),
    };
    let call = app_state
        .provider
        .create_phone_call(&request)
        .await
        .map_err(|e| AppError::internal_with_detail(FAILED, e))?;

    let record = NewCall {
        call_id: call.call_id.clone(),
        lead_id: lead.id,
        status: REGISTERED_STATUS.to_string(),
        from_number: Some(app_state.from_number.clone()),
        to_number: Some(phone_number),
    };
    // the call is already placed, so a missing record is only logged
    if let Err(e) = app_state.store.insert_call(&record).await {
        error!(error=%e, call_id=%call.call_id, "failed to create call record");
    }
    info!(call_id=%call.call_id, lead_id=%lead.id, "call initiated");

    Ok(Json(
        ApiResponse::data(call).with_message("Call initiated successfully"),
    ))
}

/// Serve a call from the store once it has analysis; otherwise ask the provider and
/// write what it says back.
pub async fn get_call(
    State(app_state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Result<Json<ApiResponse<CallResponse>>, AppError> {
    const FAILED: &str = "Failed to fetch call details";

    let call_id = call_id.trim();
    if call_id.is_empty() {
        return Err(AppError::bad_request("callId is required"));
    }

    let stored = app_state
        .store
        .find_call(call_id)
        .await
        .map_err(|e| AppError::internal(FAILED, e))?;
    if let Some(call) = stored.as_ref().filter(|c| c.analysis.is_some()) {
        debug!(call_id, "call served from store");
        return Ok(Json(ApiResponse::data(stored_call_response(call))));
    }

    let fresh = app_state
        .provider
        .retrieve_call(call_id)
        .await
        .map_err(|e| AppError::internal(FAILED, e))?;

    if stored.is_some() {
        app_state
            .store
            .update_call_outcome(call_id, &call_outcome(&fresh))
            .await
            .map_err(|e| AppError::internal(FAILED, e))?;
        debug!(call_id, status=%fresh.call_status, "call record refreshed");
    }

    Ok(Json(ApiResponse::data(fresh)))
}

pub async fn create_batch_call(
    State(app_state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
    payload: Result<Json<BatchCallRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<BatchCallResponse>>), AppError> {
    const REQUIRED: &str = "from_number and leads (non-empty array) are required";
    const FAILED: &str = "Failed to create batch call";

    let Json(mut body) = payload.map_err(|e| reject_body(e, REQUIRED))?;
    let entries = body.leads.take().unwrap_or_default();
    if entries.is_empty() {
        return Err(AppError::bad_request(REQUIRED));
    }
    let trigger_timestamp = body.trigger_timestamp()?;
    let batch_name = body.name()?;

    let mut tasks = Vec::with_capacity(entries.len());
    let mut lead_ids = Vec::with_capacity(entries.len());
    for entry in entries {
        let Ok(entry) = serde_json::from_value::<BatchLeadInput>(entry) else {
            debug!("skipping malformed batch entry");
            continue;
        };
        let Some(phone_number) = non_empty(entry.phone_number) else {
            debug!("skipping batch entry without phone number");
            continue;
        };
        let name = non_empty(entry.name);
        let email = non_empty(entry.email);

        let contact = ContactUpsert {
            name: name.clone(),
            email: email.clone(),
            phone_number: phone_number.clone(),
        };
        let lead = app_state
            .store
            .upsert_contact(owner, &contact)
            .await
            .map_err(|e| AppError::internal_with_detail(FAILED, e))?;
        lead_ids.push(lead.id);

        tasks.push(BatchCallTask {
            retell_llm_dynamic_variables: dynamic_variables(&[
                ("name", name.as_deref()),
                ("email", email.as_deref()),
                ("phone_number", Some(phone_number.as_str())),
            ]),
            to_number: phone_number,
            override_agent_id: Some(app_state.agent_id.clone()),
        });
    }

    if tasks.is_empty() {
        return Err(AppError::bad_request("No valid leads provided"));
    }

    let request = CreateBatchCallRequest {
        from_number: app_state.from_number.clone(),
        tasks,
        name: batch_name,
        trigger_timestamp,
    };
    let batch = app_state
        .provider
        .create_batch_call(&request)
        .await
        .map_err(|e| AppError::internal_with_detail(FAILED, e))?;

    let record = NewBatchCall {
        batch_call_id: batch.batch_call_id.clone(),
        owner_id: owner,
        agent_id: app_state.agent_id.clone(),
        lead_ids,
    };
    if let Err(e) = app_state.store.insert_batch_call(&record).await {
        error!(error=%e, batch_call_id=%batch.batch_call_id, "failed to create batch call record");
    }
    info!(batch_call_id=%batch.batch_call_id, tasks = request.tasks.len(), "batch call created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(batch).with_message("Batch call created successfully")),
    ))
}

pub async fn list_batch_calls(
    State(app_state): State<Arc<AppState>>,
    OwnerId(owner): OwnerId,
) -> Result<Json<ApiResponse<Vec<BatchCall>>>, AppError> {
    let batches = app_state
        .store
        .batch_calls(owner)
        .await
        .map_err(|e| AppError::internal("Failed to fetch batch calls", e))?;
    Ok(Json(ApiResponse::data(batches)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{Harness, AGENT_ID, FROM_NUMBER};
    use crate::retell::{MockVoiceProvider, ProviderError};
    use crate::store::Store;
    use mockall::predicate::eq;
    use serde_json::json;

    fn registered(call_id: &str, to: &str) -> CallResponse {
        CallResponse {
            call_id: call_id.to_string(),
            call_type: Some("phone_call".to_string()),
            call_status: "registered".to_string(),
            from_number: Some(FROM_NUMBER.to_string()),
            to_number: Some(to.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn call_lead_places_call_and_records_it() {
        // given
        let mut provider = MockVoiceProvider::new();
        provider
            .expect_create_phone_call()
            .withf(|req| {
                req.to_number == "+15550001111"
                    && req.from_number == FROM_NUMBER
                    && req.override_agent_id.as_deref() == Some(AGENT_ID)
                    && req.retell_llm_dynamic_variables["subject"].is_empty()
                    && req.retell_llm_dynamic_variables["name"] == "Pat"
            })
            .times(1)
            .returning(|req| Ok(registered("call_abc", &req.to_number)));
        let harness = Harness::new(provider);

        // when
        let (status, body) = harness
            .send(
                "POST",
                "/call-lead",
                Some(json!({ "name": "Pat", "email": "pat@example.com", "phoneNumber": "+15550001111" })),
            )
            .await;

        // then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Call initiated successfully");
        assert_eq!(body["data"]["call_id"], "call_abc");

        let call = harness.store.find_call("call_abc").await.unwrap().unwrap();
        assert_eq!(call.status, "registered");
        let leads = harness.store.leads_with_calls(harness.owner).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].lead.email.as_deref(), Some("pat@example.com"));
        assert_eq!(leads[0].calls[0].call_id, "call_abc");
    }

    #[tokio::test]
    async fn call_lead_requires_contact_fields() {
        let mut provider = MockVoiceProvider::new();
        provider.expect_create_phone_call().never();
        let harness = Harness::new(provider);

        let (status, body) = harness
            .send("POST", "/call-lead", Some(json!({ "name": "Pat", "phoneNumber": "+1555" })))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "name, email, and phoneNumber are required");
    }

    #[tokio::test]
    async fn call_lead_without_owner_is_unauthorized() {
        let harness = Harness::new(MockVoiceProvider::new());
        let (status, body) = harness
            .send_as(
                None,
                "POST",
                "/call-lead",
                Some(json!({ "name": "Pat", "email": "p@x.io", "phoneNumber": "+1555" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn provider_failure_is_reported_with_detail() {
        let mut provider = MockVoiceProvider::new();
        provider.expect_create_phone_call().returning(|_| {
            Err(ProviderError::Status {
                status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
                body: "invalid to_number".to_string(),
            })
        });
        let harness = Harness::new(provider);

        let (status, body) = harness
            .send(
                "POST",
                "/call-lead",
                Some(json!({ "name": "Pat", "email": "p@x.io", "phoneNumber": "bogus" })),
            )
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to initiate call");
        assert!(body["error"].as_str().unwrap().contains("invalid to_number"));
    }

    #[tokio::test]
    async fn cached_call_skips_provider() {
        let mut provider = MockVoiceProvider::new();
        provider
            .expect_create_phone_call()
            .returning(|req| Ok(registered("call_done", &req.to_number)));
        provider
            .expect_retrieve_call()
            .times(1)
            .returning(|_| {
                Ok(CallResponse {
                    call_id: "call_done".to_string(),
                    call_type: Some("phone_call".to_string()),
                    call_status: "ended".to_string(),
                    call_analysis: Some(json!({ "call_summary": "interested in a condo" })),
                    transcript: Some("Agent: hello".to_string()),
                    duration_ms: Some(61_000),
                    call_cost: Some(crate::retell_types::CallCost {
                        combined_cost: Some(12.5),
                        ..Default::default()
                    }),
                    from_number: Some(FROM_NUMBER.to_string()),
                    to_number: Some("+15550002222".to_string()),
                    ..Default::default()
                })
            });
        let harness = Harness::new(provider);
        harness
            .send(
                "POST",
                "/call-lead",
                Some(json!({ "name": "Lee", "email": "lee@x.io", "phoneNumber": "+15550002222" })),
            )
            .await;

        // first read goes to the provider and fills the record
        let (status, body) = harness.send("GET", "/call/call_done", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["call_status"], "ended");
        let stored = harness.store.find_call("call_done").await.unwrap().unwrap();
        assert_eq!(stored.cost, Some(12.5));
        assert_eq!(stored.duration_ms, Some(61_000));

        // second read is answered from the record; the mock allows one retrieval only
        let (status, body) = harness.send("GET", "/call/call_done", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["call_analysis"]["call_summary"], "interested in a condo");
        assert_eq!(body["data"]["call_cost"]["combined_cost"], 12.5);
        assert_eq!(body["data"]["transcript"], "Agent: hello");
    }

    #[tokio::test]
    async fn unknown_call_is_fetched_but_not_stored() {
        let mut provider = MockVoiceProvider::new();
        provider
            .expect_retrieve_call()
            .with(eq("call_elsewhere"))
            .returning(|id| {
                Ok(CallResponse {
                    call_id: id.to_string(),
                    call_status: "ongoing".to_string(),
                    ..Default::default()
                })
            });
        let harness = Harness::new(provider);

        let (status, body) = harness.send("GET", "/call/call_elsewhere", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["call_status"], "ongoing");
        assert!(harness.store.find_call("call_elsewhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn call_fetch_failure_is_generic() {
        let mut provider = MockVoiceProvider::new();
        provider.expect_retrieve_call().returning(|_| {
            Err(ProviderError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                body: "not found".to_string(),
            })
        });
        let harness = Harness::new(provider);

        let (status, body) = harness.send("GET", "/call/missing", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to fetch call details");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn batch_skips_entries_without_phone() {
        let mut provider = MockVoiceProvider::new();
        provider
            .expect_create_batch_call()
            .withf(|req| {
                req.tasks.len() == 2
                    && req.trigger_timestamp == Some(1_700_000_000_000)
                    && req.tasks[1].retell_llm_dynamic_variables.get("name").is_none()
            })
            .times(1)
            .returning(|req| {
                Ok(BatchCallResponse {
                    batch_call_id: "batch_1".to_string(),
                    total_task_count: Some(req.tasks.len() as u32),
                    ..Default::default()
                })
            });
        let harness = Harness::new(provider);

        let (status, body) = harness
            .send(
                "POST",
                "/create-batch-call",
                Some(json!({
                    "leads": [
                        { "name": "Ann", "phoneNumber": "+1001" },
                        { "name": "No Phone" },
                        { "phoneNumber": "+1002" }
                    ],
                    "trigger_timestamp": 1_700_000_000_000i64
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Batch call created successfully");
        assert_eq!(body["data"]["batch_call_id"], "batch_1");

        let leads = harness.store.leads_with_calls(harness.owner).await.unwrap();
        assert_eq!(leads.len(), 2);
        assert!(leads.iter().any(|l| l.lead.name == "+1002"));

        let (_, body) = harness.send("GET", "/batch-calls", None).await;
        let batches = body["data"].as_array().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0]["expectedCalls"], 2);
        assert_eq!(batches[0]["status"], "pending");
        assert_eq!(batches[0]["agentId"], AGENT_ID);
    }

    #[tokio::test]
    async fn batch_with_no_valid_entries_is_rejected() {
        let mut provider = MockVoiceProvider::new();
        provider.expect_create_batch_call().never();
        let harness = Harness::new(provider);

        let (status, body) = harness
            .send(
                "POST",
                "/create-batch-call",
                Some(json!({ "leads": [{ "name": "Ann" }, { "phoneNumber": "  " }] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No valid leads provided");

        let (status, body) = harness
            .send("POST", "/create-batch-call", Some(json!({ "leads": [] })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "from_number and leads (non-empty array) are required"
        );
    }

    #[tokio::test]
    async fn web_call_refresh_keeps_stored_numbers() {
        let mut provider = MockVoiceProvider::new();
        provider
            .expect_create_phone_call()
            .returning(|req| Ok(registered("call_web", &req.to_number)));
        provider.expect_retrieve_call().times(1).returning(|_| {
            Ok(CallResponse {
                call_id: "call_web".to_string(),
                call_type: Some("web_call".to_string()),
                call_status: "ended".to_string(),
                call_analysis: Some(json!({ "call_successful": true })),
                from_number: Some("+19990000000".to_string()),
                ..Default::default()
            })
        });
        let harness = Harness::new(provider);
        harness
            .send(
                "POST",
                "/call-lead",
                Some(json!({ "name": "Kim", "email": "kim@x.io", "phoneNumber": "+15550003333" })),
            )
            .await;

        let (status, _) = harness.send("GET", "/call/call_web", None).await;

        assert_eq!(status, StatusCode::OK);
        let stored = harness.store.find_call("call_web").await.unwrap().unwrap();
        assert_eq!(stored.status, "ended");
        assert!(stored.analysis.is_some());
        assert_eq!(stored.from_number.as_deref(), Some(FROM_NUMBER));
        assert_eq!(stored.to_number.as_deref(), Some("+15550003333"));
    }

    #[tokio::test]
    async fn batch_skips_mistyped_entries() {
        let mut provider = MockVoiceProvider::new();
        provider
            .expect_create_batch_call()
            .withf(|req| req.tasks.len() == 1 && req.tasks[0].to_number == "+1001")
            .times(1)
            .returning(|_| {
                Ok(BatchCallResponse {
                    batch_call_id: "batch_mixed".to_string(),
                    ..Default::default()
                })
            });
        let harness = Harness::new(provider);

        let (status, _) = harness
            .send(
                "POST",
                "/create-batch-call",
                Some(json!({
                    "leads": [
                        { "name": "Ann", "phoneNumber": "+1001" },
                        { "name": "Bob", "phoneNumber": 15550001 },
                        null
                    ]
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        let leads = harness.store.leads_with_calls(harness.owner).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].lead.phone_number, "+1001");
    }

    #[tokio::test]
    async fn batch_rejects_malformed_trigger_timestamp() {
        let mut provider = MockVoiceProvider::new();
        provider.expect_create_batch_call().never();
        let harness = Harness::new(provider);

        for trigger in [json!("tomorrow"), json!(1.5)] {
            let (status, body) = harness
                .send(
                    "POST",
                    "/create-batch-call",
                    Some(json!({
                        "leads": [{ "name": "Ann", "phoneNumber": "+1001" }],
                        "trigger_timestamp": trigger
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                body["message"],
                "trigger_timestamp must be an integer (unix milliseconds)"
            );
        }
        let leads = harness.store.leads_with_calls(harness.owner).await.unwrap();
        assert!(leads.is_empty());
    }
}
