use serde_json::Value;
use tracing::{info, warn};

use super::PipelineStep;
use crate::constants::{MISSING_PO_DISCREPANCY, ORCHESTRATOR_ID, PO_KEY_TYPE, VALIDATOR_ID};
use crate::domain::{PipelineState, StateUpdate};
use crate::envelope::{MessageEnvelope, TaskPayload};
use crate::error::{FailureKind, Result};
use crate::observability::metrics;
use crate::remote::{RemoteCallError, RemoteToolClient};

/// Checks the invoice's purchase-order number against the record store.
///
/// An invalid or unverifiable key is a business outcome recorded as a
/// discrepancy; the run continues so a rejection report gets written.
pub struct ValidationStep {
    client: RemoteToolClient,
    address: String,
}

/// What the record store said about a key.
#[derive(Debug, Clone, PartialEq)]
struct KeyCheck {
    valid: bool,
    reason: Option<String>,
}

impl ValidationStep {
    pub fn new(client: RemoteToolClient, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    fn check_key(&self, key: &str) -> Result<KeyCheck> {
        let request = MessageEnvelope::new(
            ORCHESTRATOR_ID,
            VALIDATOR_ID,
            TaskPayload::ValidateKey {
                key_type: PO_KEY_TYPE.to_string(),
                key: key.to_string(),
            },
        );
        let reply = self.client.dispatch(&self.address, &request)?;
        let valid = reply
            .get("valid")
            .and_then(Value::as_bool)
            .ok_or_else(|| RemoteCallError::malformed(&reply.to_string(), "reply has no boolean 'valid'"))?;
        let reason = reply
            .get("reason")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        let response = request.reply(TaskPayload::ValidationResult {
            valid,
            reason: reason.clone(),
        });
        info!(message_id = %response.message_id(), "Remote result for {}: valid={}", key, valid);
        Ok(KeyCheck { valid, reason })
    }
}

impl PipelineStep for ValidationStep {
    fn execute(&self, state: &PipelineState) -> StateUpdate {
        let Some(data) = state.structured_data.as_ref() else {
            warn!("No structured data received");
            return StateUpdate::failed(
                FailureKind::MissingRequiredData,
                "No structured data available for validation",
            );
        };

        let Some(po_number) = data.business_key() else {
            warn!("❌ No PO number found, skipping remote validation");
            metrics::validation::discrepancies(1);
            return StateUpdate::new().validation(false, vec![MISSING_PO_DISCREPANCY.to_string()]);
        };

        info!("Validating PO number {}", po_number);
        let mut discrepancies = Vec::new();
        match self.check_key(po_number) {
            Ok(KeyCheck { valid: true, .. }) => {}
            Ok(KeyCheck { valid: false, reason }) => {
                info!("PO {} rejected: {}", po_number, reason.as_deref().unwrap_or("no reason given"));
                discrepancies.push(format!("Invalid PO Number: {} (Not found in ERP)", po_number));
            }
            // Unverifiable is reported like invalid; the run still produces a report
            Err(e) => {
                warn!("Validation call failed: {}", e);
                discrepancies.push(format!("System Error: {}", e));
            }
        }

        metrics::validation::discrepancies(discrepancies.len());
        let is_valid = discrepancies.is_empty();
        StateUpdate::new().validation(is_valid, discrepancies)
    }

    fn step_name(&self) -> &'static str {
        "validation"
    }
}
