use chrono::{DateTime, Utc};
use serde::Serialize;

/// The JSON record RPUSHed onto `<ns>:failed` for every handler/plugin error, per spec §3 and
/// §4.3's failure path. `payload` is the raw first arg of the failed job; Resque's wire format
/// always calls the exception class `"Error"` regardless of what actually failed.
#[derive(Debug, Serialize)]
pub struct FailedRecord<'a> {
    #[serde(rename = "FailedAt")]
    pub failed_at: DateTime<Utc>,
    #[serde(rename = "Payload")]
    pub payload: &'a serde_json::Value,
    #[serde(rename = "Exception")]
    pub exception: &'static str,
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "Worker")]
    pub worker: String,
    #[serde(rename = "Queue")]
    pub queue: &'a str,
}

impl<'a> FailedRecord<'a> {
    pub fn new(payload: &'a serde_json::Value, error: String, worker: String, queue: &'a str) -> Self {
        FailedRecord {
            failed_at: Utc::now(),
            payload,
            exception: "Error",
            error,
            worker,
            queue,
        }
    }
}

static MISSING_PAYLOAD: serde_json::Value = serde_json::Value::Null;

/// Resolves the `Payload` field per spec §3: "the raw first arg of the failed job". A job
/// with no args (malformed or unknown-class) still needs a record, so this falls back to
/// JSON `null` rather than failing the whole failure path.
pub fn first_arg(args: &[serde_json::Value]) -> &serde_json::Value {
    args.first().unwrap_or(&MISSING_PAYLOAD)
}
