use std::sync::Arc;
use tracing::{info, warn};

use super::PipelineStep;
use crate::app::ports::DocumentSourcePort;
use crate::domain::{PipelineState, PipelineStatus, StateUpdate};
use crate::error::FailureKind;

/// Finds the document for this run, either the one requested or the next in the inbox.
pub struct IntakeStep {
    source: Arc<dyn DocumentSourcePort>,
}

impl IntakeStep {
    pub fn new(source: Arc<dyn DocumentSourcePort>) -> Self {
        Self { source }
    }
}

impl PipelineStep for IntakeStep {
    fn execute(&self, state: &PipelineState) -> StateUpdate {
        if state.rerun_data().is_some() {
            info!("📥 Rerun with operator data, no document to claim");
            return StateUpdate::with_status(PipelineStatus::Processing);
        }

        let requested = state.file_name.as_deref();
        match self.source.locate(requested) {
            Ok(Some(doc)) => {
                info!("📥 Processing document {} ({})", doc.name, doc.path.display());
                StateUpdate::with_status(PipelineStatus::Processing)
                    .document(doc.path.display().to_string(), doc.name)
            }
            Ok(None) => {
                info!("📭 No documents waiting");
                StateUpdate::with_status(PipelineStatus::Waiting)
            }
            Err(e) => {
                warn!("Intake failed: {}", e);
                let kind = if requested.is_some() {
                    FailureKind::MissingRequiredData
                } else {
                    FailureKind::LocalProcessingCrash
                };
                StateUpdate::failed(kind, e)
            }
        }
    }

    fn step_name(&self) -> &'static str {
        "intake"
    }
}
