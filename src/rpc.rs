// ============================================================================
// JSON-RPC transport
// ============================================================================
//
// Line-delimited JSON-RPC 2.0: one request object per line in, one response
// object per line out. Methods: `voices`, `submit`, `login`, `export`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::commands::{self, ExportRequest, LoginRequest, ServiceError};
use crate::database::RatingSubmission;
use crate::state::AppState;

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const SERVICE_ERROR: i32 = -32000;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    #[serde(default)]
    jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message, data }),
        }
    }
}

enum DispatchError {
    MethodNotFound(String),
    InvalidParams(String),
    Service(ServiceError),
}

impl From<ServiceError> for DispatchError {
    fn from(e: ServiceError) -> Self {
        DispatchError::Service(e)
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T, DispatchError> {
    serde_json::from_value(params).map_err(|e| DispatchError::InvalidParams(e.to_string()))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Internal(e.to_string()).into())
}

async fn dispatch(state: Arc<AppState>, method: &str, params: Value) -> Result<Value, DispatchError> {
    match method {
        "voices" => to_value(commands::get_voices(&state).await?),
        "submit" => {
            if !params.is_array() {
                return Err(DispatchError::InvalidParams(
                    "Expected a non-empty array of ratings.".to_string(),
                ));
            }
            // Items are decoded one by one so a malformed item is reported in place
            let items: Vec<Value> = parse_params(params)?;
            let batch: Vec<RatingSubmission> = items.into_iter().map(RatingSubmission::from_json).collect();
            to_value(commands::submit_ratings(state, batch).await?)
        }
        "login" => {
            let request: LoginRequest = parse_params(params)?;
            to_value(commands::login(&state, request).await?)
        }
        "export" => {
            let request: ExportRequest = parse_params(params)?;
            to_value(commands::download_db(state, request).await?)
        }
        other => Err(DispatchError::MethodNotFound(other.to_string())),
    }
}

/// Run one request against the service
pub async fn process_request(state: Arc<AppState>, request: JsonRpcRequest) -> JsonRpcResponse {
    log::debug!("Received request: {} (id={})", request.method, request.id);

    match dispatch(state, &request.method, request.params).await {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err(DispatchError::MethodNotFound(method)) => JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
            None,
        ),
        Err(DispatchError::InvalidParams(message)) => {
            JsonRpcResponse::error(request.id, INVALID_PARAMS, format!("Invalid params: {}", message), None)
        }
        Err(DispatchError::Service(e)) => {
            log::warn!("Request {} (id={}) failed: {}", request.method, request.id, e);
            let body = e.to_response();
            let data = serde_json::to_value(&body).unwrap_or_else(|_| json!({ "status": body.status }));
            JsonRpcResponse::error(request.id, SERVICE_ERROR, body.message, Some(data))
        }
    }
}

/// Parse and run one input line, producing the line to write back
pub async fn handle_line(state: Arc<AppState>, line: &str) -> JsonRpcResponse {
    match serde_json::from_str::<JsonRpcRequest>(line) {
        Ok(request) => process_request(state, request).await,
        Err(e) => {
            log::error!("Failed to parse request: {}", e);
            JsonRpcResponse::error(0, PARSE_ERROR, format!("Parse error: {}", e), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::DatabaseManager;
    use crate::dataset::{DatasetEntry, DatasetIndex};
    use tempfile::{tempdir, TempDir};

    fn create_state() -> (TempDir, Arc<AppState>) {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.database_path = dir.path().join("database.db");
        let db = DatabaseManager::new(config.database_path.clone()).unwrap();
        let index = DatasetIndex::from_entries(vec![
            DatasetEntry::new("a", "hello"),
            DatasetEntry::new("b", "world"),
        ]);
        (dir, Arc::new(AppState::new(config, index, db)))
    }

    fn response_json(response: &JsonRpcResponse) -> Value {
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_voices_request() {
        let (_dir, state) = create_state();
        let response = handle_line(state, r#"{"jsonrpc":"2.0","id":1,"method":"voices"}"#).await;

        let body = response_json(&response);
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"].as_array().unwrap().len(), 2);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_submit_request_reports_item_errors() {
        let (_dir, state) = create_state();
        let line = r#"{"jsonrpc":"2.0","id":7,"method":"submit","params":[
            {"voice_id":"a","original_transcription":"hello","edited_transcription":"hello",
             "noise_rating":3,"naturalness_rating":4,"pronunciation_rating":5},
            {"voice_id":"b","original_transcription":"world","edited_transcription":"word",
             "naturalness_rating":4,"pronunciation_rating":5}
        ]}"#;

        let body = response_json(&handle_line(Arc::clone(&state), line).await);

        assert_eq!(body["error"]["code"], SERVICE_ERROR);
        assert_eq!(body["error"]["data"]["status"], 400);
        assert_eq!(body["error"]["data"]["class"], "rejected");
        let errors = body["error"]["data"]["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["index"], 1);
        assert_eq!(errors[0]["voice_id"], "b");
        assert_eq!(errors[0]["type"], "validation");
        assert_eq!(errors[0]["problems"][0]["field"], "noise_rating");
        assert_eq!(state.db().count_ratings().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_request_reports_wrong_types_with_other_items() {
        let (_dir, state) = create_state();
        let line = r#"{"jsonrpc":"2.0","id":9,"method":"submit","params":[
            {"voice_id":"a","original_transcription":"hello","edited_transcription":"hello",
             "naturalness_rating":4,"pronunciation_rating":5},
            {"voice_id":"b","original_transcription":"world","edited_transcription":"world",
             "noise_rating":"3","naturalness_rating":4,"pronunciation_rating":5},
            null
        ]}"#;

        let body = response_json(&handle_line(Arc::clone(&state), line).await);

        assert_eq!(body["error"]["code"], SERVICE_ERROR);
        assert_eq!(body["error"]["data"]["class"], "rejected");
        let errors = body["error"]["data"]["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 3);

        assert_eq!(errors[0]["index"], 0);
        assert_eq!(errors[0]["problems"][0]["problem"], "missing");
        assert_eq!(errors[0]["problems"][0]["field"], "noise_rating");

        assert_eq!(errors[1]["index"], 1);
        assert_eq!(errors[1]["voice_id"], "b");
        assert_eq!(errors[1]["problems"][0]["problem"], "invalid_type");
        assert_eq!(errors[1]["problems"][0]["field"], "noise_rating");

        assert_eq!(errors[2]["index"], 2);
        assert_eq!(errors[2]["voice_id"], "unknown");
        assert_eq!(errors[2]["problems"][0]["problem"], "not_an_object");
        assert_eq!(state.db().count_ratings().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_request_success() {
        let (_dir, state) = create_state();
        let line = r#"{"jsonrpc":"2.0","id":2,"method":"submit","params":[
            {"voice_id":"a","original_transcription":"hi","edited_transcription":"hi",
             "noise_rating":1,"naturalness_rating":1,"pronunciation_rating":1}
        ]}"#;

        let body = response_json(&handle_line(Arc::clone(&state), line).await);

        assert_eq!(body["result"]["count"], 1);
        assert_eq!(state.db().count_ratings().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_requires_array() {
        let (_dir, state) = create_state();
        let line = r#"{"jsonrpc":"2.0","id":3,"method":"submit","params":{"voice_id":"a"}}"#;
        let body = response_json(&handle_line(state, line).await);
        assert_eq!(body["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_json() {
        let (_dir, state) = create_state();

        let body = response_json(&handle_line(Arc::clone(&state), r#"{"id":4,"method":"delete"}"#).await);
        assert_eq!(body["error"]["code"], METHOD_NOT_FOUND);

        let body = response_json(&handle_line(state, "not json").await);
        assert_eq!(body["error"]["code"], PARSE_ERROR);
        assert_eq!(body["id"], 0);
    }
}
