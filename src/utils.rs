use crate::db_types::{Call, CallOutcome};
use crate::retell_types::{CallCost, CallResponse};

use std::collections::HashMap;

/// Trimmed value, or `None` when absent or blank.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Variables the agent prompt can reference. Absent values are left out.
pub fn dynamic_variables(pairs: &[(&str, Option<&str>)]) -> HashMap<String, String> {
    pairs
        .iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v.to_string())))
        .collect()
}

/// Render a stored call in the provider's response shape.
pub fn stored_call_response(call: &Call) -> CallResponse {
    CallResponse {
        call_id: call.call_id.clone(),
        call_status: call.status.clone(),
        call_analysis: call.analysis.clone(),
        transcript: call.transcript.clone(),
        recording_url: call.recording_url.clone(),
        duration_ms: call.duration_ms,
        call_cost: Some(CallCost {
            combined_cost: call.cost,
            ..Default::default()
        }),
        from_number: call.from_number.clone(),
        to_number: call.to_number.clone(),
        ..Default::default()
    }
}

/// Fields of a provider call worth keeping. Numbers are only trusted on phone calls.
pub fn call_outcome(call: &CallResponse) -> CallOutcome {
    let (from_number, to_number) = if call.is_phone_call() {
        (call.from_number.clone(), call.to_number.clone())
    } else {
        (None, None)
    };
    CallOutcome {
        status: call.call_status.clone(),
        analysis: call.call_analysis.clone(),
        transcript: call.transcript.clone(),
        recording_url: call.recording_url.clone(),
        duration_ms: call.duration_ms,
        cost: call.call_cost.as_ref().and_then(|c| c.combined_cost),
        from_number,
        to_number,
    }
}
