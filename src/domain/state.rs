use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{InvoiceData, ReportRecord};
use crate::error::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Starting,
    /// Intake found nothing to do; the caller decides whether to poll again
    Waiting,
    Processing,
    Completed,
    Failed,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Starting => "STARTING",
            PipelineStatus::Waiting => "WAITING",
            PipelineStatus::Processing => "PROCESSING",
            PipelineStatus::Completed => "COMPLETED",
            PipelineStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state threaded through every stage of one run.
///
/// Stages never mutate it; they return a [`StateUpdate`] which the
/// orchestrator folds in with [`PipelineState::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: Uuid,
    /// Document location handed to the extraction service
    pub file_path: Option<String>,
    /// Display name; for intake requests this is the requested file name
    pub file_name: Option<String>,
    pub raw_text: String,
    pub structured_data: Option<InvoiceData>,
    pub is_valid: bool,
    pub discrepancies: Vec<String>,
    /// Rendered HTML artifact
    pub final_report: Option<String>,
    pub report_record: Option<ReportRecord>,
    pub status: PipelineStatus,
    pub error_message: Option<String>,
    pub error_kind: Option<FailureKind>,
    pub is_rerun: bool,
    pub corrected_data: Option<InvoiceData>,
    /// Identifier of the report being corrected on a rerun
    pub rerun_invoice_id: Option<String>,
}

impl PipelineState {
    /// Fresh state; `requested_file` targets a specific inbox file instead of scanning.
    pub fn new(requested_file: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            file_path: None,
            file_name: requested_file,
            raw_text: String::new(),
            structured_data: None,
            is_valid: false,
            discrepancies: Vec::new(),
            final_report: None,
            report_record: None,
            status: PipelineStatus::Starting,
            error_message: None,
            error_kind: None,
            is_rerun: false,
            corrected_data: None,
            rerun_invoice_id: None,
        }
    }

    /// State seeded with operator-corrected data.
    pub fn for_rerun(invoice_id: impl Into<String>, corrected: InvoiceData) -> Self {
        let invoice_id = invoice_id.into();
        Self {
            file_path: Some("manual_override".to_string()),
            file_name: Some(invoice_id.clone()),
            is_rerun: true,
            corrected_data: Some(corrected),
            rerun_invoice_id: Some(invoice_id),
            ..Self::new(None)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == PipelineStatus::Failed
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, PipelineStatus::Failed | PipelineStatus::Completed)
    }

    /// Corrected data is only honoured when the rerun flag is set too.
    pub fn rerun_data(&self) -> Option<&InvoiceData> {
        if self.is_rerun {
            self.corrected_data.as_ref()
        } else {
            None
        }
    }

    /// Fold a stage's partial update into the state, last write wins per field.
    ///
    /// A failed state is frozen: later updates cannot revert the status or
    /// touch the error, discrepancies or report.
    pub fn merge(mut self, update: StateUpdate) -> Self {
        if self.is_failed() {
            if !update.is_empty() {
                tracing::warn!(run_id = %self.run_id, "Ignoring update to a failed pipeline state");
            }
            return self;
        }

        let StateUpdate {
            file_path,
            file_name,
            raw_text,
            structured_data,
            is_valid,
            discrepancies,
            final_report,
            report_record,
            status,
            error_message,
            error_kind,
        } = update;

        if let Some(v) = file_path {
            self.file_path = Some(v);
        }
        if let Some(v) = file_name {
            self.file_name = Some(v);
        }
        if let Some(v) = raw_text {
            self.raw_text = v;
        }
        if let Some(v) = structured_data {
            self.structured_data = Some(v);
        }
        if let Some(v) = is_valid {
            self.is_valid = v;
        }
        if let Some(v) = discrepancies {
            self.discrepancies = v;
        }
        if let Some(v) = final_report {
            self.final_report = Some(v);
        }
        if let Some(v) = report_record {
            self.report_record = Some(v);
        }
        if let Some(v) = status {
            self.status = v;
        }
        if let Some(v) = error_message {
            self.error_message = Some(v);
        }
        if let Some(v) = error_kind {
            self.error_kind = Some(v);
        }
        self
    }
}

/// The keys a stage changed. Unset fields leave the state untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub raw_text: Option<String>,
    pub structured_data: Option<InvoiceData>,
    pub is_valid: Option<bool>,
    pub discrepancies: Option<Vec<String>>,
    pub final_report: Option<String>,
    pub report_record: Option<ReportRecord>,
    pub status: Option<PipelineStatus>,
    pub error_message: Option<String>,
    pub error_kind: Option<FailureKind>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: PipelineStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Fatal outcome for the rest of the run.
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: Some(PipelineStatus::Failed),
            error_message: Some(message.into()),
            error_kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn document(mut self, path: impl Into<String>, name: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self.file_name = Some(name.into());
        self
    }

    pub fn raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = Some(text.into());
        self
    }

    pub fn structured_data(mut self, data: InvoiceData) -> Self {
        self.structured_data = Some(data);
        self
    }

    pub fn validation(mut self, is_valid: bool, discrepancies: Vec<String>) -> Self {
        self.is_valid = Some(is_valid);
        self.discrepancies = Some(discrepancies);
        self
    }

    pub fn report(mut self, html: String, record: ReportRecord) -> Self {
        self.final_report = Some(html);
        self.report_record = Some(record);
        self
    }

    pub fn status(mut self, status: PipelineStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the fields this update sets, for logging.
    pub fn changed_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        let flags = [
            ("file_path", self.file_path.is_some()),
            ("file_name", self.file_name.is_some()),
            ("raw_text", self.raw_text.is_some()),
            ("structured_data", self.structured_data.is_some()),
            ("is_valid", self.is_valid.is_some()),
            ("discrepancies", self.discrepancies.is_some()),
            ("final_report", self.final_report.is_some()),
            ("report_record", self.report_record.is_some()),
            ("status", self.status.is_some()),
            ("error_message", self.error_message.is_some()),
            ("error_kind", self.error_kind.is_some()),
        ];
        for (name, set) in flags {
            if set {
                keys.push(name);
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_last_write_wins_per_field() {
        let state = PipelineState::new(None)
            .merge(StateUpdate::with_status(PipelineStatus::Processing).document("a.pdf", "a.pdf"))
            .merge(StateUpdate::new().raw_text("hello"))
            .merge(StateUpdate::new().raw_text("world"));

        assert_eq!(state.status, PipelineStatus::Processing);
        assert_eq!(state.file_path.as_deref(), Some("a.pdf"));
        assert_eq!(state.raw_text, "world");
        assert!(state.structured_data.is_none());
    }

    #[test]
    fn failed_state_is_frozen() {
        let failed = PipelineState::new(None)
            .merge(StateUpdate::failed(FailureKind::SystemConnectivity, "Connection Failed: x"));

        let after = failed.clone().merge(
            StateUpdate::with_status(PipelineStatus::Completed)
                .validation(true, vec!["late".to_string()]),
        );
        assert_eq!(after, failed);
        assert_eq!(after.error_message.as_deref(), Some("Connection Failed: x"));
    }

    #[test]
    fn failure_and_values_in_one_update_both_apply() {
        let state = PipelineState::new(None).merge(
            StateUpdate::failed(FailureKind::RemoteBusinessRejection, "File not found").raw_text(""),
        );
        assert!(state.is_failed());
        assert_eq!(state.raw_text, "");
        assert_eq!(state.error_kind, Some(FailureKind::RemoteBusinessRejection));
    }

    #[test]
    fn rerun_data_requires_flag() {
        let mut state = PipelineState::for_rerun("INV-1", InvoiceData::default());
        assert!(state.rerun_data().is_some());
        state.is_rerun = false;
        assert!(state.rerun_data().is_none());
    }

    #[test]
    fn changed_keys_lists_set_fields() {
        let update = StateUpdate::failed(FailureKind::MissingRequiredData, "x").raw_text("");
        assert_eq!(
            update.changed_keys(),
            vec!["raw_text", "status", "error_message", "error_kind"]
        );
        assert!(StateUpdate::new().is_empty());
    }
}
