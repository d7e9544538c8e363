//! Pipeline and remote-call metrics with Prometheus naming.
//!
//! Recording is a no-op until [`init`] installs the recorder, so library users
//! and tests pay nothing for it.

use std::fmt;
use std::sync::OnceLock;
use tracing::info;

use crate::domain::PipelineStatus;
use crate::error::FailureKind;

/// All metric names used in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    PipelineRunsStarted,
    PipelineRunsFinished,
    PipelineStagesSkipped,
    PipelineStageDuration,
    RemoteCallsSuccess,
    RemoteCallsError,
    RemoteCallDuration,
    ValidationDiscrepancies,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PipelineRunsStarted => "auditor_pipeline_runs_started_total",
            MetricName::PipelineRunsFinished => "auditor_pipeline_runs_finished_total",
            MetricName::PipelineStagesSkipped => "auditor_pipeline_stages_skipped_total",
            MetricName::PipelineStageDuration => "auditor_pipeline_stage_duration_seconds",
            MetricName::RemoteCallsSuccess => "auditor_remote_calls_success_total",
            MetricName::RemoteCallsError => "auditor_remote_calls_error_total",
            MetricName::RemoteCallDuration => "auditor_remote_call_duration_seconds",
            MetricName::ValidationDiscrepancies => "auditor_validation_discrepancies",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    let _ = METRICS_HANDLE.set(handle);
    info!("Metrics system initialized");
    Ok(())
}

/// Text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod pipeline {
    use super::{MetricName, PipelineStatus};

    pub fn run_started() {
        ::metrics::counter!(MetricName::PipelineRunsStarted.as_str()).increment(1);
    }

    pub fn run_finished(status: PipelineStatus) {
        ::metrics::counter!(MetricName::PipelineRunsFinished.as_str(), "status" => status.as_str())
            .increment(1);
    }

    pub fn stage_skipped(stage: &'static str) {
        ::metrics::counter!(MetricName::PipelineStagesSkipped.as_str(), "stage" => stage).increment(1);
    }

    pub fn stage_duration(stage: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::PipelineStageDuration.as_str(), "stage" => stage).record(secs);
    }
}

pub mod remote {
    use super::{FailureKind, MetricName};

    pub fn call_success(operation: &str) {
        ::metrics::counter!(MetricName::RemoteCallsSuccess.as_str(), "operation" => operation.to_string())
            .increment(1);
    }

    pub fn call_error(operation: &str, kind: FailureKind) {
        ::metrics::counter!(
            MetricName::RemoteCallsError.as_str(),
            "operation" => operation.to_string(),
            "kind" => kind.as_str()
        )
        .increment(1);
    }

    pub fn call_duration(operation: &str, secs: f64) {
        ::metrics::histogram!(MetricName::RemoteCallDuration.as_str(), "operation" => operation.to_string())
            .record(secs);
    }
}

pub mod validation {
    use super::MetricName;

    pub fn discrepancies(count: usize) {
        ::metrics::histogram!(MetricName::ValidationDiscrepancies.as_str()).record(count as f64);
    }
}
