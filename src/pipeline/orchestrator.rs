use serde::Deserialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

use super::steps::{
    ExtractionStep, IntakeStep, PipelineStep, ReportingStep, StructuringStep, ValidationStep,
};
use crate::app::ports::DocumentSourcePort;
use crate::config::{Config, RemoteConfig};
use crate::domain::{InvoiceData, PipelineState, PipelineStatus, StateUpdate};
use crate::error::FailureKind;
use crate::infra::inbox_watcher::InboxWatcher;
use crate::observability::metrics;
use crate::remote::RemoteToolClient;

/// Operator correction for a previously reported invoice.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RerunRequest {
    pub invoice_id: String,
    pub corrected_fields: InvoiceData,
}

/// Runs the stages in fixed order over one state.
pub struct PipelineOrchestrator {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl PipelineOrchestrator {
    /// Intake → Extraction → Structuring → Validation → Reporting.
    pub fn new(
        source: Arc<dyn DocumentSourcePort>,
        client: RemoteToolClient,
        remote: &RemoteConfig,
    ) -> Self {
        let steps: Vec<Box<dyn PipelineStep>> = vec![
            Box::new(IntakeStep::new(source)),
            Box::new(ExtractionStep::new(client.clone(), &remote.extraction_address)),
            Box::new(StructuringStep::new(client.clone(), &remote.language_address)),
            Box::new(ValidationStep::new(client.clone(), &remote.extraction_address)),
            Box::new(ReportingStep::new(client, &remote.language_address)),
        ];
        Self::with_steps(steps)
    }

    /// Inbox on disk, tool services over HTTP.
    pub fn from_config(config: &Config) -> Self {
        let source = Arc::new(InboxWatcher::new(
            &config.intake.incoming_dir,
            &config.intake.processed_dir,
        ));
        let client = RemoteToolClient::http(config.remote.request_timeout());
        Self::new(source, client, &config.remote)
    }

    /// Stages run in the order given. The first one is treated as intake.
    pub fn with_steps(steps: Vec<Box<dyn PipelineStep>>) -> Self {
        Self { steps }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.step_name()).collect()
    }

    /// Drive `initial` through every stage.
    ///
    /// Once the state is `FAILED` the remaining stages are skipped, though the
    /// first stage always runs. `WAITING` after intake ends the run quietly.
    pub fn run(&self, initial: PipelineState) -> PipelineState {
        let span = info_span!(
            "pipeline_run",
            run_id = %initial.run_id,
            document = initial.file_name.as_deref().unwrap_or("-"),
            rerun = initial.is_rerun
        );
        let _enter = span.enter();
        info!("🚀 Starting pipeline run");
        metrics::pipeline::run_started();

        let mut state = initial;
        for (index, step) in self.steps.iter().enumerate() {
            let name = step.step_name();
            if index > 0 && state.is_failed() {
                debug!("⏭️ Skipping {} after failure", name);
                metrics::pipeline::stage_skipped(name);
                continue;
            }

            info!("🔄 Executing step {}/{}: {}", index + 1, self.steps.len(), name);
            let started = Instant::now();
            let update = run_guarded(step.as_ref(), &state);
            metrics::pipeline::stage_duration(name, started.elapsed().as_secs_f64());
            debug!("Step '{}' updated {:?}", name, update.changed_keys());

            state = state.merge(update);
            match state.status {
                PipelineStatus::Failed => {
                    error!(
                        "❌ Step '{}' failed: {}",
                        name,
                        state.error_message.as_deref().unwrap_or("unknown error")
                    );
                }
                PipelineStatus::Waiting => {
                    info!("📭 Nothing to process, stopping after {}", name);
                    break;
                }
                PipelineStatus::Completed => {
                    info!("✅ Step '{}' completed the run", name);
                    break;
                }
                _ => info!("✅ Step '{}' completed", name),
            }
        }

        match state.status {
            PipelineStatus::Failed => warn!(
                kind = ?state.error_kind,
                "💥 Pipeline failed: {}",
                state.error_message.as_deref().unwrap_or("unknown error")
            ),
            status => info!("🎉 Pipeline finished with status {}", status),
        }
        metrics::pipeline::run_finished(state.status);
        state
    }

    /// Run again with operator data in place of extraction and structuring.
    pub fn rerun(&self, request: RerunRequest) -> PipelineState {
        info!("🔁 Rerun requested for {}", request.invoice_id);
        self.run(PipelineState::for_rerun(request.invoice_id, request.corrected_fields))
    }
}

/// A panicking stage fails the run instead of taking the process down.
fn run_guarded(step: &dyn PipelineStep, state: &PipelineState) -> StateUpdate {
    match panic::catch_unwind(AssertUnwindSafe(|| step.execute(state))) {
        Ok(update) => update,
        Err(payload) => {
            let cause = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "stage panicked".to_string());
            error!("Step '{}' crashed: {}", step.step_name(), cause);
            StateUpdate::failed(
                FailureKind::LocalProcessingCrash,
                format!("System Error: {}", cause),
            )
        }
    }
}
