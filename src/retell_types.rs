use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

mod request {
    use super::*;

    #[derive(Serialize, Clone, PartialEq, Debug, Default)]
    pub struct CreatePhoneCallRequest {
        pub from_number: String,
        pub to_number: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub override_agent_id: Option<String>,
        #[serde(skip_serializing_if = "HashMap::is_empty")]
        pub retell_llm_dynamic_variables: HashMap<String, String>,
    }

    #[derive(Serialize, Clone, PartialEq, Debug, Default)]
    pub struct BatchCallTask {
        pub to_number: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub override_agent_id: Option<String>,
        #[serde(skip_serializing_if = "HashMap::is_empty")]
        pub retell_llm_dynamic_variables: HashMap<String, String>,
    }

    #[derive(Serialize, Clone, PartialEq, Debug, Default)]
    pub struct CreateBatchCallRequest {
        pub from_number: String,
        pub tasks: Vec<BatchCallTask>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        // unix millis; omitted means "send now"
        #[serde(skip_serializing_if = "Option::is_none")]
        pub trigger_timestamp: Option<i64>,
    }
}
pub use request::*;

mod response {
    use super::*;

    /// A call as Retell reports it. Fields we don't read are kept in `extra` so
    /// the payload can be passed back to clients unchanged.
    #[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
    pub struct CallResponse {
        pub call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub call_type: Option<String>,
        pub call_status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub call_analysis: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub transcript: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub recording_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub duration_ms: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub call_cost: Option<CallCost>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub from_number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub to_number: Option<String>,
        #[serde(flatten)]
        pub extra: Map<String, Value>,
    }

    impl CallResponse {
        pub fn is_phone_call(&self) -> bool {
            self.call_type.as_deref() == Some("phone_call")
        }
    }

    #[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
    pub struct CallCost {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub combined_cost: Option<f64>,
        #[serde(flatten)]
        pub extra: Map<String, Value>,
    }

    #[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
    pub struct BatchCallResponse {
        pub batch_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub from_number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub scheduled_timestamp: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub total_task_count: Option<u32>,
        #[serde(flatten)]
        pub extra: Map<String, Value>,
    }
}
pub use response::*;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_response_keeps_unknown_fields() {
        let raw = json!({
            "call_id": "call_a2ff263e",
            "call_type": "phone_call",
            "agent_id": "agent_79e638",
            "call_status": "registered",
            "call_cost": { "combined_cost": 0, "product_costs": [] },
            "from_number": "+14155550100",
            "to_number": "+14155550199",
            "direction": "outbound"
        });
        let call: CallResponse = serde_json::from_value(raw.clone()).unwrap();
        assert!(call.is_phone_call());
        assert_eq!(call.call_cost.as_ref().unwrap().combined_cost, Some(0.0));
        assert_eq!(call.extra["direction"], "outbound");

        let echoed = serde_json::to_value(&call).unwrap();
        assert_eq!(echoed["agent_id"], raw["agent_id"]);
        assert_eq!(echoed["call_cost"]["product_costs"], json!([]));
    }

    #[test]
    fn null_analysis_reads_as_missing() {
        let call: CallResponse = serde_json::from_value(json!({
            "call_id": "c1",
            "call_status": "ongoing",
            "call_analysis": null
        }))
        .unwrap();
        assert_eq!(call.call_analysis, None);
        assert!(!call.is_phone_call());
    }

    #[test]
    fn batch_request_omits_unset_fields() {
        let req = CreateBatchCallRequest {
            from_number: "+14155550100".to_string(),
            tasks: vec![BatchCallTask {
                to_number: "+14155550199".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "from_number": "+14155550100",
                "tasks": [{ "to_number": "+14155550199" }]
            })
        );
    }
}
