use serde_json::Value;
use tracing::{error, info};

use super::PipelineStep;
use crate::constants::{EXTRACTOR_ID, HUMAN_PROVIDED_TEXT, ORCHESTRATOR_ID};
use crate::domain::{PipelineState, PipelineStatus, StateUpdate};
use crate::envelope::{MessageEnvelope, TaskPayload};
use crate::error::{AuditorError, Result};
use crate::remote::{RemoteCallError, RemoteToolClient};

/// Pulls raw text out of the document through the extraction service.
pub struct ExtractionStep {
    client: RemoteToolClient,
    address: String,
}

impl ExtractionStep {
    pub fn new(client: RemoteToolClient, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    fn extract(&self, state: &PipelineState) -> Result<String> {
        let document_path = state
            .file_path
            .clone()
            .ok_or_else(|| AuditorError::MissingData("No document location to extract from".to_string()))?;

        let request = MessageEnvelope::new(
            ORCHESTRATOR_ID,
            EXTRACTOR_ID,
            TaskPayload::ExtractText { document_path },
        );
        let reply = self.client.dispatch(&self.address, &request)?;
        let text = reply
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteCallError::malformed(&reply.to_string(), "reply has no 'text' field"))?
            .to_string();

        let response = request.reply(TaskPayload::ExtractionResult { text: text.clone() });
        info!(message_id = %response.message_id(), "OCR success: {} chars", text.len());
        Ok(text)
    }
}

impl PipelineStep for ExtractionStep {
    fn execute(&self, state: &PipelineState) -> StateUpdate {
        if let Some(corrected) = state.rerun_data() {
            info!("Skipping OCR, using operator-provided data");
            return StateUpdate::with_status(PipelineStatus::Processing)
                .raw_text(HUMAN_PROVIDED_TEXT)
                .structured_data(corrected.clone());
        }

        match self.extract(state) {
            Ok(text) => StateUpdate::new().raw_text(text),
            Err(e) => {
                error!("OCR failed: {}", e);
                // Empty text keeps the field populated for later merges
                StateUpdate::failed(e.kind(), e.to_string()).raw_text("")
            }
        }
    }

    fn step_name(&self) -> &'static str {
        "extraction"
    }
}
