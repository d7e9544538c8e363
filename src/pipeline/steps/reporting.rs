use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};

use super::PipelineStep;
use crate::constants::{ORCHESTRATOR_ID, REPORTER_ID};
use crate::domain::report::{report_id, summarize, STATUS_FAIL, STATUS_PASS};
use crate::domain::{AuditTrail, InvoiceData, PipelineState, PipelineStatus, ReportRecord, StateUpdate};
use crate::envelope::{MessageEnvelope, ReportRequest, TaskPayload};
use crate::error::{FailureKind, Result};
use crate::remote::{RemoteCallError, RemoteToolClient};

/// Renders the audit report and builds its metadata record.
///
/// The rendered HTML and the record go into the state; writing them out is
/// left to whoever drives the pipeline.
pub struct ReportingStep {
    client: RemoteToolClient,
    address: String,
}

impl ReportingStep {
    pub fn new(client: RemoteToolClient, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    fn render(&self, data: &InvoiceData, state: &PipelineState) -> Result<String> {
        let verdict = if state.is_valid { STATUS_PASS } else { STATUS_FAIL };
        let request = MessageEnvelope::new(
            ORCHESTRATOR_ID,
            REPORTER_ID,
            TaskPayload::GenerateReport {
                report: ReportRequest {
                    invoice: data.clone(),
                    validation_status: verdict.to_string(),
                    discrepancies: state.discrepancies.clone(),
                },
            },
        );
        let reply = self.client.dispatch(&self.address, &request)?;
        let html = reply
            .get("html")
            .and_then(Value::as_str)
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| RemoteCallError::malformed(&reply.to_string(), "reply has no 'html'"))?
            .to_string();

        let response = request.reply(TaskPayload::ReportResult { html: html.clone() });
        info!(message_id = %response.message_id(), "Report rendered: {} bytes", html.len());
        Ok(html)
    }
}

fn build_record(data: &InvoiceData, state: &PipelineState) -> ReportRecord {
    let key = state.rerun_invoice_id.as_deref().or_else(|| data.invoice_key());
    let id = report_id(key);
    let now = Utc::now();
    ReportRecord {
        artifact_name: format!("{}.html", id),
        id,
        original_key: data.invoice_key().map(|s| s.to_string()),
        status: if state.is_valid { STATUS_PASS } else { STATUS_FAIL }.to_string(),
        summary: summarize(data, state.is_valid, &state.discrepancies),
        timestamp: now,
        audit_trail: AuditTrail {
            invoice_data: data.clone(),
            discrepancies: state.discrepancies.clone(),
            generated_at: now,
            rerun: state.is_rerun,
        },
    }
}

impl PipelineStep for ReportingStep {
    fn execute(&self, state: &PipelineState) -> StateUpdate {
        let Some(data) = state.structured_data.as_ref() else {
            return StateUpdate::failed(FailureKind::MissingRequiredData, "No structured data for reporting");
        };

        match self.render(data, state) {
            Ok(html) => {
                let record = build_record(data, state);
                info!("📝 Report {} ready: {}", record.id, record.summary);
                StateUpdate::new()
                    .report(html, record)
                    .status(PipelineStatus::Completed)
            }
            Err(e) => {
                error!("Reporting failed: {}", e);
                StateUpdate::failed(e.kind(), e.to_string())
            }
        }
    }

    fn step_name(&self) -> &'static str {
        "reporting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ToolReply;
    use crate::pipeline::steps::test_support::{client, ScriptedTransport};
    use serde_json::json;

    fn validated(data: Value, is_valid: bool, discrepancies: Vec<&str>) -> PipelineState {
        let data: InvoiceData = serde_json::from_value(data).unwrap();
        PipelineState::new(None).merge(
            StateUpdate::with_status(PipelineStatus::Processing)
                .structured_data(data)
                .validation(is_valid, discrepancies.into_iter().map(String::from).collect()),
        )
    }

    #[test]
    fn approved_report_completes_the_run() {
        let transport = ScriptedTransport::with(vec![Ok(ToolReply::text(r#"{"html": "<h1>INV-1</h1>"}"#))]);
        let state = validated(
            json!({"invoice_no": "INV-1", "vendor_name": "Acme Corp", "total_amount": 500, "po_number": "PO-1001"}),
            true,
            vec![],
        );
        let update = ReportingStep::new(client(&transport), "http://lang").execute(&state);

        assert_eq!(update.status, Some(PipelineStatus::Completed));
        assert_eq!(update.final_report.as_deref(), Some("<h1>INV-1</h1>"));
        let record = update.report_record.unwrap();
        assert_eq!(record.id, "INV-1");
        assert_eq!(record.artifact_name, "INV-1.html");
        assert_eq!(record.status, "PASS");
        assert_eq!(record.summary, "Approved: Acme Corp | $500");
        assert!(!record.audit_trail.rerun);
    }

    #[test]
    fn render_request_carries_the_verdict_as_a_json_string() {
        let transport = ScriptedTransport::with(vec![Ok(ToolReply::text(r#"{"html": "<p/>"}"#))]);
        let state = validated(
            json!({"invoice_no": "INV-9", "po_number": "PO-9"}),
            false,
            vec!["Invalid PO Number: PO-9 (Not found in ERP)"],
        );
        ReportingStep::new(client(&transport), "http://lang").execute(&state);

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].1, "render_report");
        let sent: Value = serde_json::from_str(calls[0].2["report_data"].as_str().unwrap()).unwrap();
        assert_eq!(sent["invoice_no"], "INV-9");
        assert_eq!(sent["validation_status"], "FAIL");
        assert_eq!(sent["discrepancies"][0], "Invalid PO Number: PO-9 (Not found in ERP)");
    }

    #[test]
    fn rejected_summary_and_unknown_id() {
        let transport = ScriptedTransport::with(vec![Ok(ToolReply::text(r#"{"html": "<p/>"}"#))]);
        let state = validated(json!({"invoice_no": "null"}), false, vec!["Missing PO Number in Invoice Data"]);
        let record = ReportingStep::new(client(&transport), "http://lang")
            .execute(&state)
            .report_record
            .unwrap();

        assert!(record.id.starts_with("Unknown_"));
        assert_eq!(record.original_key, None);
        assert_eq!(record.status, "FAIL");
        assert_eq!(record.summary, "Rejected: Missing PO Number in Invoice Data");
    }

    #[test]
    fn rerun_reuses_the_corrected_invoice_id() {
        let transport = ScriptedTransport::with(vec![Ok(ToolReply::text(r#"{"html": "<p/>"}"#))]);
        let corrected: InvoiceData = serde_json::from_value(json!({"invoice_no": "INV-77b"})).unwrap();
        let state = PipelineState::for_rerun("INV-77", corrected.clone())
            .merge(StateUpdate::new().structured_data(corrected).validation(true, vec![]));
        let record = ReportingStep::new(client(&transport), "http://lang")
            .execute(&state)
            .report_record
            .unwrap();

        assert_eq!(record.id, "INV-77");
        assert_eq!(record.original_key.as_deref(), Some("INV-77b"));
        assert!(record.audit_trail.rerun);
    }

    #[test]
    fn missing_html_is_malformed() {
        let transport = ScriptedTransport::with(vec![Ok(ToolReply::text(r#"{"status": "ok"}"#))]);
        let state = validated(json!({"invoice_no": "INV-1"}), true, vec![]);
        let update = ReportingStep::new(client(&transport), "http://lang").execute(&state);
        assert_eq!(update.status, Some(PipelineStatus::Failed));
        assert_eq!(update.error_kind, Some(FailureKind::MalformedRemoteResponse));
        assert!(update.final_report.is_none());
    }

    #[test]
    fn no_data_fails_without_a_call() {
        let transport = ScriptedTransport::with(vec![]);
        let update = ReportingStep::new(client(&transport), "http://lang").execute(&PipelineState::new(None));
        assert_eq!(update.error_kind, Some(FailureKind::MissingRequiredData));
        assert_eq!(transport.call_count(), 0);
    }
}
