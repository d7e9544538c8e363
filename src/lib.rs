//! Invoice audit pipeline.
//!
//! A single document flows through Intake → Extraction → Structuring →
//! Validation → Reporting. Stages that need remote computation go through the
//! blocking [`remote::RemoteToolClient`], which hides the async transport.

pub mod config;
pub mod constants;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod remote;

// Layered boundaries: ports (traits) and their infrastructure adapters
pub mod app;
pub mod infra;

pub use domain::{InvoiceData, LineItem, PipelineState, PipelineStatus, StateUpdate};
pub use envelope::{EnvelopeStatus, MessageEnvelope, TaskPayload};
pub use error::{AuditorError, FailureKind, Result};
pub use pipeline::{PipelineOrchestrator, RerunRequest};
pub use remote::{RemoteCallError, RemoteToolClient};
