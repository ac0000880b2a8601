//! Seriesly response verification
//!
//! A query answers with an object keyed by bucket start (milliseconds, as a
//! string), each holding the reduced values of that bucket.

use crate::model::Outcome;
use crate::transport::HttpReply;
use serde_json::{Map, Value};

fn parse(reply: &HttpReply) -> Result<Map<String, Value>, Outcome> {
    // The server answers a query it cannot satisfy with a non-200 status
    if reply.status != reqwest::StatusCode::OK {
        return Err(Outcome::NotFound);
    }
    if reply.body.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(&reply.body) {
        Ok(Value::Object(buckets)) => Ok(buckets),
        Ok(other) => Err(Outcome::Malformed(format!(
            "expected an object, got {}",
            other
        ))),
        Err(e) => Err(Outcome::Malformed(e.to_string())),
    }
}

fn check_bucket(bucket: Option<&Value>) -> Outcome {
    match bucket {
        None => Outcome::NotFound,
        Some(Value::Array(values)) if values.is_empty() => Outcome::NotFound,
        Some(Value::Array(_)) => Outcome::Found,
        Some(other) => Outcome::Malformed(format!("bucket is not an array: {}", other)),
    }
}

/// The bucket keyed by the queried millisecond must hold a value
pub fn verify_read(timestamp_ms: i64, reply: &HttpReply) -> Outcome {
    match parse(reply) {
        Ok(buckets) => check_bucket(buckets.get(&timestamp_ms.to_string())),
        Err(outcome) => outcome,
    }
}

/// Bucket keys depend on the group size, so the first one is checked
pub fn verify_scan(reply: &HttpReply) -> Outcome {
    match parse(reply) {
        Ok(buckets) => check_bucket(buckets.values().next()),
        Err(outcome) => outcome,
    }
}

/// Documents are only accepted with `201 Created`
pub fn verify_insert(reply: &HttpReply) -> Outcome {
    if reply.status == reqwest::StatusCode::CREATED {
        Outcome::Found
    } else {
        Outcome::Rejected(format!("document store answered {}", reply.status))
    }
}
