//! Shared fixtures: an in-process server backed by the memory store and a
//! scripted provider.

use async_trait::async_trait;
use call_genie::retell::{ProviderError, VoiceProvider};
use call_genie::retell_types::{
    BatchCallResponse, CallResponse, CreateBatchCallRequest, CreatePhoneCallRequest,
};
use call_genie::store::MemoryStore;
use call_genie::types::AppState;
use serde_json::json;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const FROM_NUMBER: &str = "+14155550100";
pub const AGENT_ID: &str = "agent_integration";

/// Provider that answers every call as registered and records what it was asked.
#[derive(Default)]
pub struct ScriptedProvider {
    pub phone_calls: Mutex<Vec<CreatePhoneCallRequest>>,
    pub batch_calls: Mutex<Vec<CreateBatchCallRequest>>,
    pub retrieved: Mutex<Vec<String>>,
}

#[async_trait]
impl VoiceProvider for ScriptedProvider {
    async fn create_phone_call(
        &self,
        request: &CreatePhoneCallRequest,
    ) -> Result<CallResponse, ProviderError> {
        let mut calls = self.phone_calls.lock().unwrap();
        calls.push(request.clone());
        Ok(CallResponse {
            call_id: format!("call_{}", calls.len()),
            call_type: Some("phone_call".to_string()),
            call_status: "registered".to_string(),
            from_number: Some(request.from_number.clone()),
            to_number: Some(request.to_number.clone()),
            ..Default::default()
        })
    }

    async fn retrieve_call(&self, call_id: &str) -> Result<CallResponse, ProviderError> {
        self.retrieved.lock().unwrap().push(call_id.to_string());
        Ok(CallResponse {
            call_id: call_id.to_string(),
            call_type: Some("phone_call".to_string()),
            call_status: "ended".to_string(),
            call_analysis: Some(json!({ "call_summary": "Interested in a 3 bedroom" })),
            transcript: Some("Agent: Hi there".to_string()),
            duration_ms: Some(42_000),
            from_number: Some(FROM_NUMBER.to_string()),
            ..Default::default()
        })
    }

    async fn create_batch_call(
        &self,
        request: &CreateBatchCallRequest,
    ) -> Result<BatchCallResponse, ProviderError> {
        self.batch_calls.lock().unwrap().push(request.clone());
        Ok(BatchCallResponse {
            batch_call_id: "batch_1".to_string(),
            name: request.name.clone(),
            from_number: Some(request.from_number.clone()),
            total_task_count: Some(request.tasks.len() as u32),
            ..Default::default()
        })
    }
}

pub struct TestServer {
    addr: SocketAddr,
    pub provider: Arc<ScriptedProvider>,
    pub owner: Uuid,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn start() -> Self {
        let provider = Arc::new(ScriptedProvider::default());
        let app_state = Arc::new(AppState {
            store: Arc::new(MemoryStore::new()),
            provider: provider.clone(),
            agent_id: AGENT_ID.to_string(),
            from_number: FROM_NUMBER.to_string(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let server = axum::Server::from_tcp(listener)
            .expect("Failed to build server")
            .serve(call_genie::app(app_state).into_make_service());
        let handle = tokio::spawn(async move {
            server.await.expect("server error");
        });

        Self {
            addr,
            provider,
            owner: Uuid::new_v4(),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
