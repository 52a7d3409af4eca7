//! Wire contract between the sourcing service and its clients.
//!
//! The notification channel carries bare text frames with no envelope
//! guarantee, so inbound decoding is total: a frame either matches the
//! terminal result envelope, is some other JSON value, or is a plain log
//! line. Nothing in the decode path can fail.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator value marking the terminal frame of a task.
pub const RESULT_EVENT_TYPE: &str = "result";

/// Body of `POST /sourcing`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourcingRequest {
    pub query: String,
}

/// Response of `POST /sourcing`. The task id is an opaque handle; it is
/// echoed in a log line and stored with the completed record, nothing else.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskStarted {
    pub task_id: String,
    pub status: String,
    pub query: String,
}

/// One golden keyword entry in a sourcing report.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GoldenKeyword {
    pub keyword: String,
    pub search_volume: String,
    pub competition: String,
    pub reason: String,
    pub risk: String,
}

/// Structured final report produced by the sourcing worker.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SourcingReport {
    #[serde(default)]
    pub query: String,
    pub golden_keywords: Vec<GoldenKeyword>,
    pub market_analysis: String,
}

/// Terminal payload of a task.
///
/// The server does not enforce a schema on `data`, so the client keeps
/// whatever arrives: a typed report when the payload matches the sourcing
/// schema, the raw JSON value otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Report(SourcingReport),
    Unstructured(Value),
}

impl TaskResult {
    /// Build a result from the `data` field of a terminal frame.
    pub fn from_data(data: Value) -> Self {
        match serde_json::from_value::<SourcingReport>(data.clone()) {
            Ok(report) => TaskResult::Report(report),
            Err(_) => TaskResult::Unstructured(data),
        }
    }

    /// The payload as plain JSON, for storage and display.
    pub fn as_value(&self) -> Value {
        match self {
            TaskResult::Report(report) => {
                serde_json::to_value(report).unwrap_or(Value::Null)
            }
            TaskResult::Unstructured(value) => value.clone(),
        }
    }
}

/// Envelope for the terminal frame published by the worker.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResultEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

impl ResultEnvelope {
    pub fn new(data: Value) -> Self {
        Self {
            event_type: RESULT_EVENT_TYPE.to_string(),
            data,
        }
    }

    /// Serialize to the text frame sent over the channel.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A decoded inbound channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Terminal frame: the task's result payload.
    Result(TaskResult),
    /// JSON that is not a result envelope; logged in stringified form.
    Json(Value),
    /// Anything that failed JSON parsing; logged verbatim.
    Line(String),
}

impl InboundEvent {
    /// Decode one raw text frame. Never fails: unparseable input degrades
    /// to [`InboundEvent::Line`].
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                if value.get("type").and_then(Value::as_str) == Some(RESULT_EVENT_TYPE) {
                    let data = value.get("data").cloned().unwrap_or(Value::Null);
                    InboundEvent::Result(TaskResult::from_data(data))
                } else {
                    InboundEvent::Json(value)
                }
            }
            Err(_) => InboundEvent::Line(raw.to_string()),
        }
    }
}
