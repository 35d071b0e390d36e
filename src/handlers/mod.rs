pub mod calls;
pub mod leads;

use crate::error::AppError;

use axum::{extract::rejection::JsonRejection, Json};
use tracing::debug;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Unreadable bodies are answered with the endpoint's own validation message.
fn reject_body(rejection: JsonRejection, message: &str) -> AppError {
    debug!(rejection=%rejection.body_text(), "rejected request body");
    AppError::bad_request(message)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::owner::OWNER_HEADER;
    use crate::retell::{MockVoiceProvider, VoiceProvider};
    use crate::store::{MemoryStore, Store};
    use crate::types::AppState;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    pub const AGENT_ID: &str = "agent_test";
    pub const FROM_NUMBER: &str = "+14155550100";

    pub struct Harness {
        pub store: Arc<MemoryStore>,
        pub router: Router,
        pub owner: Uuid,
    }

    impl Harness {
        pub fn new(provider: MockVoiceProvider) -> Self {
            let store = Arc::new(MemoryStore::new());
            let provider: Arc<dyn VoiceProvider> = Arc::new(provider);
            let store_dyn: Arc<dyn Store> = store.clone();
            let state = Arc::new(AppState {
                store: store_dyn,
                provider,
                agent_id: AGENT_ID.to_string(),
                from_number: FROM_NUMBER.to_string(),
            });
            Self {
                store,
                router: crate::app(state),
                owner: Uuid::new_v4(),
            }
        }

        pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            self.send_as(Some(self.owner), method, uri, body).await
        }

        pub async fn send_as(
            &self,
            owner: Option<Uuid>,
            method: &str,
            uri: &str,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json");
            if let Some(owner) = owner {
                builder = builder.header(OWNER_HEADER, owner.to_string());
            }
            let body = match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            };
            let response = self
                .router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }
    }
}
