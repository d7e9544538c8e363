// Audit pipeline: stages plus the orchestrator that drives them

pub mod orchestrator;
pub mod steps;

pub use orchestrator::{PipelineOrchestrator, RerunRequest};
pub use steps::{
    ExtractionStep, IntakeStep, PipelineStep, ReportingStep, StructuringStep, ValidationStep,
};
