use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use crate::domain::ReportRecord;

/// Transport to a remote tool service. One call is one fresh session.
#[async_trait]
pub trait ToolTransportPort: Send + Sync {
    /// `Err` means the service could not be reached or the session broke.
    async fn call_tool(
        &self,
        address: &str,
        operation: &str,
        arguments: Value,
    ) -> Result<ToolReply, String>;
}

/// Raw reply content of a tool call, before any decoding.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolReply {
    /// Text content blocks in the order the service returned them
    pub content: Vec<String>,
    /// Set when the service flagged the call itself as failed
    pub is_error: bool,
}

impl ToolReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![text.into()],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![message.into()],
            is_error: true,
        }
    }

    /// First non-blank content block.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .map(String::as_str)
            .find(|c| !c.trim().is_empty())
    }
}

/// Where intake finds documents.
pub trait DocumentSourcePort: Send + Sync {
    /// With `requested`, resolve that document; otherwise take the next waiting one.
    /// `Ok(None)` means there is nothing to process.
    fn locate(&self, requested: Option<&str>) -> Result<Option<LocatedDocument>, String>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocatedDocument {
    pub path: PathBuf,
    pub name: String,
}

/// Persists rendered reports. Callers of the pipeline own this, not the stages.
pub trait ReportStorePort: Send + Sync {
    fn save(&self, record: &ReportRecord, html: &str) -> Result<PathBuf, String>;
}
