//! Domain data shapes shared by the stages, the orchestrator and the CLI.

pub mod invoice;
pub mod report;
pub mod state;

pub use invoice::{is_null_like, present, InvoiceData, LineItem};
pub use report::{AuditTrail, ReportRecord};
pub use state::{PipelineState, PipelineStatus, StateUpdate};
