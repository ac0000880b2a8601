//! Prometheus query API response verification

use crate::model::Outcome;
use crate::transport::HttpReply;
use serde::Deserialize;

/// Envelope of `/api/v1/query` answers
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryData {
    #[serde(rename = "resultType", default)]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<serde_json::Value>,
}

/// Success requires `status == "success"` and at least one series
pub fn verify_query(reply: &HttpReply) -> Outcome {
    let response: QueryResponse = match serde_json::from_str(&reply.body) {
        Ok(response) => response,
        Err(_) if !reply.status.is_success() => {
            return Outcome::Rejected(format!("query answered {}", reply.status));
        }
        Err(e) => return Outcome::Malformed(e.to_string()),
    };

    if response.status != "success" {
        return Outcome::Rejected(format!(
            "query status {:?}: {}",
            response.status,
            response.error.unwrap_or_default()
        ));
    }

    match response.data {
        Some(data) if !data.result.is_empty() => {
            tracing::trace!("{} {} series returned", data.result.len(), data.result_type);
            Outcome::Found
        }
        _ => Outcome::NotFound,
    }
}
