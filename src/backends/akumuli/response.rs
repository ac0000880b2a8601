//! Akumuli response verification
//!
//! Query results come back as CSV, one row per sample:
//! `<series>,<timestamp>,<value>`. Errors come back as a single line
//! starting with `-` and count as no data.

use crate::model::Outcome;
use crate::transport::HttpReply;
use csv::{ReaderBuilder, StringRecord, Trim};

fn parse(reply: &HttpReply) -> Result<Vec<StringRecord>, Outcome> {
    if !reply.status.is_success() {
        return Err(Outcome::Rejected(format!(
            "query answered with {}",
            reply.status
        )));
    }

    // Error lines (`-<message>`) mean the query matched nothing usable
    let body = reply.body.trim_start();
    if let Some(message) = body.strip_prefix('-') {
        let message = message.lines().next().unwrap_or_default().trim();
        tracing::debug!("akumuli answered with error line: {}", message);
        return Err(Outcome::NotFound);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Outcome::Malformed(e.to_string()))
}

/// A point lookup must yield exactly one row stamped with `expected_ts`
pub fn verify_read(expected_ts: &str, reply: &HttpReply) -> Outcome {
    let rows = match parse(reply) {
        Ok(rows) => rows,
        Err(outcome) => return outcome,
    };

    match rows.as_slice() {
        [] => Outcome::NotFound,
        [row] if row.len() != 3 => {
            Outcome::Malformed(format!("expected 3 fields, got {}", row.len()))
        }
        [row] if &row[1] != expected_ts => Outcome::Rejected(format!(
            "value stamped {} instead of {}",
            &row[1], expected_ts
        )),
        [_] => Outcome::Found,
        rows => Outcome::Rejected(format!("expected one value, got {}", rows.len())),
    }
}

/// A scan succeeds as soon as one complete row is present
pub fn verify_scan(reply: &HttpReply) -> Outcome {
    let rows = match parse(reply) {
        Ok(rows) => rows,
        Err(outcome) => return outcome,
    };

    if rows.iter().any(|row| row.len() >= 3) {
        Outcome::Found
    } else {
        Outcome::NotFound
    }
}
