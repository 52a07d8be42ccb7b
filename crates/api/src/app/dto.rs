use axum::{Json, extract::FromRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use natours_core::QueryParams;

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

/// JSON body extractor whose rejections render as [`ApiError`]s.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Raw `?key=value` pairs, in request order.
pub type RawParams = Vec<(String, String)>;

pub fn query_params(pairs: RawParams) -> QueryParams {
    QueryParams::from_pairs(pairs)
}

// -------------------------
// Response envelopes
// -------------------------

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(format!("failed to encode response: {e}")))
}

/// `{status: "success", data: {<key>: <value>}}`
pub fn success(key: &str, value: Value) -> Json<Value> {
    let mut data = Map::new();
    data.insert(key.to_string(), value);
    Json(json!({"status": "success", "data": data}))
}

/// `{status: "success", results, data: {<key>: [...]}}`
pub fn listing(key: &str, items: Vec<Value>) -> Json<Value> {
    let mut data = Map::new();
    let results = items.len();
    data.insert(key.to_string(), Value::Array(items));
    Json(json!({"status": "success", "results": results, "data": data}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_counts_results() {
        let Json(body) = listing("tours", vec![json!({"name": "a"}), json!({"name": "b"})]);
        assert_eq!(body["status"], "success");
        assert_eq!(body["results"], 2);
        assert_eq!(body["data"]["tours"][1]["name"], "b");
    }

    #[test]
    fn repeated_plain_params_keep_the_last_value() {
        let params = query_params(vec![
            ("difficulty".into(), "easy".into()),
            ("difficulty".into(), "medium".into()),
        ]);
        assert_eq!(params.scalar("difficulty"), Some("medium"));
    }
}
