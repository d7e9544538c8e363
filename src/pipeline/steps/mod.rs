use crate::domain::{PipelineState, StateUpdate};

/// One stage of the audit pipeline.
///
/// A stage reads the current state and returns only the fields it changed.
/// Failures are folded into the update (a `FAILED` status or a discrepancy);
/// a stage never returns an error to the orchestrator.
pub trait PipelineStep: Send + Sync {
    fn execute(&self, state: &PipelineState) -> StateUpdate;

    fn step_name(&self) -> &'static str;
}

pub mod extraction;
pub mod intake;
pub mod reporting;
pub mod structuring;
pub mod validation;

pub use extraction::ExtractionStep;
pub use intake::IntakeStep;
pub use reporting::ReportingStep;
pub use structuring::StructuringStep;
pub use validation::ValidationStep;
