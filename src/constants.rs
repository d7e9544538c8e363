// Remote operation names exposed by the tool services
pub const OP_EXTRACT_TEXT: &str = "extract_text";
pub const OP_VALIDATE_BUSINESS_KEY: &str = "validate_business_key";
pub const OP_TRANSLATE_TO_STRUCTURED: &str = "translate_to_structured";
pub const OP_RENDER_REPORT: &str = "render_report";

// Default service locations
pub const DEFAULT_EXTRACTION_ADDRESS: &str = "http://127.0.0.1:8001/mcp";
pub const DEFAULT_LANGUAGE_ADDRESS: &str = "http://127.0.0.1:8002/mcp";

// Component identifiers used as envelope sender/receiver
pub const ORCHESTRATOR_ID: &str = "orchestrator";
pub const EXTRACTOR_ID: &str = "extractor";
pub const TRANSLATOR_ID: &str = "translator";
pub const VALIDATOR_ID: &str = "validator";
pub const REPORTER_ID: &str = "reporter";

/// Raw text placed in the state when an operator supplied the structured data.
pub const HUMAN_PROVIDED_TEXT: &str = "Human Corrected Data";

/// Key type understood by `validate_business_key` for purchase orders.
pub const PO_KEY_TYPE: &str = "po";

pub const MISSING_PO_DISCREPANCY: &str = "Missing PO Number in Invoice Data";

/// File extensions picked up by the inbox scan.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg"];

pub const DEFAULT_INCOMING_DIR: &str = "data/incoming";
pub const DEFAULT_PROCESSED_DIR: &str = "data/processed";
pub const DEFAULT_REPORTS_DIR: &str = "outputs/reports";
