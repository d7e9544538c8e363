#![allow(dead_code)]

use async_trait::async_trait;
use invoice_auditor::app::ports::{DocumentSourcePort, LocatedDocument, ToolReply, ToolTransportPort};
use invoice_auditor::config::RemoteConfig;
use invoice_auditor::{PipelineOrchestrator, RemoteToolClient};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const EXTRACTION_ADDRESS: &str = "http://extraction.test/mcp";
pub const LANGUAGE_ADDRESS: &str = "http://language.test/mcp";

/// Fake tool services keyed by operation name. Every call is recorded.
#[derive(Default)]
pub struct FakeServices {
    replies: Mutex<HashMap<String, Result<ToolReply, String>>>,
    pub calls: Mutex<Vec<(String, String, Value)>>,
}

impl FakeServices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(self: Arc<Self>, operation: &str, text: &str) -> Arc<Self> {
        self.replies
            .lock()
            .unwrap()
            .insert(operation.to_string(), Ok(ToolReply::text(text)));
        self
    }

    pub fn unreachable(self: Arc<Self>, operation: &str) -> Arc<Self> {
        self.replies
            .lock()
            .unwrap()
            .insert(operation.to_string(), Err("connection refused".to_string()));
        self
    }

    pub fn operations_called(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.1.clone()).collect()
    }
}

#[async_trait]
impl ToolTransportPort for FakeServices {
    async fn call_tool(&self, address: &str, operation: &str, arguments: Value) -> Result<ToolReply, String> {
        self.calls
            .lock()
            .unwrap()
            .push((address.to_string(), operation.to_string(), arguments));
        self.replies
            .lock()
            .unwrap()
            .get(operation)
            .cloned()
            .unwrap_or_else(|| Err(format!("no service for {}", operation)))
    }
}

/// Source that always hands out the same document.
pub struct FixedSource(pub Option<LocatedDocument>);

impl FixedSource {
    pub fn document(name: &str) -> Arc<Self> {
        Arc::new(Self(Some(LocatedDocument {
            path: PathBuf::from("data/processed").join(name),
            name: name.to_string(),
        })))
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self(None))
    }
}

impl DocumentSourcePort for FixedSource {
    fn locate(&self, _requested: Option<&str>) -> Result<Option<LocatedDocument>, String> {
        Ok(self.0.clone())
    }
}

pub fn remote_config() -> RemoteConfig {
    RemoteConfig {
        extraction_address: EXTRACTION_ADDRESS.to_string(),
        language_address: LANGUAGE_ADDRESS.to_string(),
        request_timeout_secs: None,
    }
}

pub fn orchestrator(source: Arc<dyn DocumentSourcePort>, services: &Arc<FakeServices>) -> PipelineOrchestrator {
    PipelineOrchestrator::new(source, RemoteToolClient::new(services.clone()), &remote_config())
}

pub const ACME_TEXT_REPLY: &str = r#"{"status": "success", "text": "INVOICE INV-1001 Acme Corp PO-1001 Total $500", "method": "digital"}"#;

pub const ACME_TRANSLATION_REPLY: &str = "```json\n{\"invoice_no\": \"INV-1001\", \"vendor_name\": \"Acme Corp\", \"currency\": \"$\", \"total_amount\": 500, \"po_number\": \"PO-1001\", \"line_items\": [{\"description\": \"Widgets\", \"qty\": 10, \"unit_price\": 50, \"total\": 500}]}\n```";
