use serde_json::Value;
use tracing::{error, info};

use super::PipelineStep;
use crate::constants::{ORCHESTRATOR_ID, TRANSLATOR_ID};
use crate::domain::{InvoiceData, PipelineState, StateUpdate};
use crate::envelope::{MessageEnvelope, TaskPayload};
use crate::error::{AuditorError, Result};
use crate::remote::{RemoteCallError, RemoteToolClient};

/// Turns raw text into structured invoice fields via the translation service.
pub struct StructuringStep {
    client: RemoteToolClient,
    address: String,
}

impl StructuringStep {
    pub fn new(client: RemoteToolClient, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    fn translate(&self, raw_text: &str) -> Result<InvoiceData> {
        if raw_text.trim().is_empty() {
            return Err(AuditorError::MissingData("No text provided for structuring".to_string()));
        }

        let request = MessageEnvelope::new(
            ORCHESTRATOR_ID,
            TRANSLATOR_ID,
            TaskPayload::TranslateExtract {
                raw_text: raw_text.to_string(),
            },
        );
        let reply = self.client.dispatch(&self.address, &request)?;
        if !reply.is_object() {
            return Err(RemoteCallError::malformed(&reply.to_string(), "expected a JSON object").into());
        }
        let data: InvoiceData = serde_json::from_value::<InvoiceData>(reply.clone())
            .map_err(|e| RemoteCallError::malformed(&reply.to_string(), e))?;

        let response = request.reply(TaskPayload::TranslationResult {
            structured_data: data.clone(),
        });
        info!(
            message_id = %response.message_id(),
            "Translation success: {} fields",
            field_count(&reply)
        );
        Ok(data)
    }
}

impl PipelineStep for StructuringStep {
    fn execute(&self, state: &PipelineState) -> StateUpdate {
        // Operator data replaces translation output, so there is nothing to ask for
        if let Some(corrected) = state.rerun_data() {
            info!("Using operator-provided structured data");
            return StateUpdate::new().structured_data(corrected.clone());
        }

        match self.translate(&state.raw_text) {
            Ok(data) => StateUpdate::new().structured_data(data),
            Err(e) => {
                error!("Translation failed: {}", e);
                StateUpdate::failed(e.kind(), e.to_string())
            }
        }
    }

    fn step_name(&self) -> &'static str {
        "structuring"
    }
}

fn field_count(value: &Value) -> usize {
    value.as_object().map(|m| m.len()).unwrap_or(0)
}
