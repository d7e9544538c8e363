//! Message envelope exchanged between the orchestrator's stages and the
//! remote tool services.
//!
//! An envelope is never mutated: a stage builds a request, sends it through
//! the remote client and answers it with a fresh reply envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

use crate::constants;
use crate::domain::InvoiceData;

/// Task-type tag plus the payload shape that goes with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPayload {
    ExtractText { document_path: String },
    TranslateExtract { raw_text: String },
    ValidateKey { key_type: String, key: String },
    GenerateReport { report: ReportRequest },
    ExtractionResult { text: String },
    TranslationResult { structured_data: InvoiceData },
    ValidationResult { valid: bool, reason: Option<String> },
    ReportResult { html: String },
    Error { error: String },
}

/// Everything the report renderer needs: the invoice plus its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(flatten)]
    pub invoice: InvoiceData,
    pub validation_status: String,
    pub discrepancies: Vec<String>,
}

impl TaskPayload {
    pub fn task_type(&self) -> &'static str {
        match self {
            TaskPayload::ExtractText { .. } => "EXTRACT_TEXT",
            TaskPayload::TranslateExtract { .. } => "TRANSLATE_EXTRACT",
            TaskPayload::ValidateKey { .. } => "VALIDATE_KEY",
            TaskPayload::GenerateReport { .. } => "GENERATE_REPORT",
            TaskPayload::ExtractionResult { .. } => "EXTRACTION_RESULT",
            TaskPayload::TranslationResult { .. } => "TRANSLATION_RESULT",
            TaskPayload::ValidationResult { .. } => "VALIDATION_RESULT",
            TaskPayload::ReportResult { .. } => "REPORT_RESULT",
            TaskPayload::Error { .. } => "ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TaskPayload::Error { .. })
    }

    /// Remote operation serving this request; `None` for results and errors.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            TaskPayload::ExtractText { .. } => Some(constants::OP_EXTRACT_TEXT),
            TaskPayload::TranslateExtract { .. } => Some(constants::OP_TRANSLATE_TO_STRUCTURED),
            TaskPayload::ValidateKey { .. } => Some(constants::OP_VALIDATE_BUSINESS_KEY),
            TaskPayload::GenerateReport { .. } => Some(constants::OP_RENDER_REPORT),
            _ => None,
        }
    }

    /// Arguments in the shape the remote operation expects.
    pub fn arguments(&self) -> Result<Value, serde_json::Error> {
        Ok(match self {
            TaskPayload::ExtractText { document_path } => json!({ "document_path": document_path }),
            TaskPayload::TranslateExtract { raw_text } => json!({ "raw_text": raw_text }),
            TaskPayload::ValidateKey { key_type, key } => json!({ "key_type": key_type, "key": key }),
            // The renderer takes its data as one JSON document in a string field
            TaskPayload::GenerateReport { report } => {
                json!({ "report_data": serde_json::to_string(report)? })
            }
            other => serde_json::to_value(other)?
                .get("payload")
                .cloned()
                .unwrap_or(Value::Null),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeStatus {
    Pending,
    Success,
    Error,
}

impl fmt::Display for EnvelopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnvelopeStatus::Pending => "PENDING",
            EnvelopeStatus::Success => "SUCCESS",
            EnvelopeStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Status `ERROR` holds exactly when the task is [`TaskPayload::Error`]; the
/// constructors and the deserializer both enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EnvelopeWire", into = "EnvelopeWire")]
pub struct MessageEnvelope {
    sender: String,
    receiver: String,
    task: TaskPayload,
    message_id: Uuid,
    timestamp: DateTime<Utc>,
    status: EnvelopeStatus,
}

impl MessageEnvelope {
    /// A new outbound envelope; `PENDING` unless it already carries an error.
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, task: TaskPayload) -> Self {
        let status = if task.is_error() {
            EnvelopeStatus::Error
        } else {
            EnvelopeStatus::Pending
        };
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            task,
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            status,
        }
    }

    /// Answer this envelope. The reply travels back to the original sender.
    pub fn reply(&self, task: TaskPayload) -> Self {
        let status = if task.is_error() {
            EnvelopeStatus::Error
        } else {
            EnvelopeStatus::Success
        };
        Self {
            sender: self.receiver.clone(),
            receiver: self.sender.clone(),
            task,
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            status,
        }
    }

    pub fn reply_error(&self, error: impl Into<String>) -> Self {
        self.reply(TaskPayload::Error { error: error.into() })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn task(&self) -> &TaskPayload {
        &self.task
    }

    pub fn into_task(self) -> TaskPayload {
        self.task
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> EnvelopeStatus {
        self.status
    }

    /// The error description when this is an error reply.
    pub fn error(&self) -> Option<&str> {
        match &self.task {
            TaskPayload::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(EnvelopeWire::from(self.clone())).unwrap_or(Value::Null)
    }
}

/// Flat JSON form: `{sender, receiver, task_type, payload, message_id, timestamp, status}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnvelopeWire {
    sender: String,
    receiver: String,
    task_type: String,
    payload: Value,
    message_id: Uuid,
    timestamp: DateTime<Utc>,
    status: EnvelopeStatus,
}

impl From<MessageEnvelope> for EnvelopeWire {
    fn from(env: MessageEnvelope) -> Self {
        let payload = match serde_json::to_value(&env.task) {
            Ok(Value::Object(mut map)) => map.remove("payload").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        Self {
            sender: env.sender,
            receiver: env.receiver,
            task_type: env.task.task_type().to_string(),
            payload,
            message_id: env.message_id,
            timestamp: env.timestamp,
            status: env.status,
        }
    }
}

impl TryFrom<EnvelopeWire> for MessageEnvelope {
    type Error = String;

    fn try_from(wire: EnvelopeWire) -> Result<Self, Self::Error> {
        let task: TaskPayload =
            serde_json::from_value(json!({ "task_type": wire.task_type, "payload": wire.payload }))
                .map_err(|e| format!("invalid envelope payload: {}", e))?;
        if (wire.status == EnvelopeStatus::Error) != task.is_error() {
            return Err(format!(
                "envelope status {} does not match task type {}",
                wire.status,
                task.task_type()
            ));
        }
        Ok(Self {
            sender: wire.sender,
            receiver: wire.receiver,
            task,
            message_id: wire.message_id,
            timestamp: wire.timestamp,
            status: wire.status,
        })
    }
}
