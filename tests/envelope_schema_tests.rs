use invoice_auditor::envelope::ReportRequest;
use invoice_auditor::{InvoiceData, MessageEnvelope, TaskPayload};
use jsonschema::JSONSchema;
use serde_json::json;

fn schema_accepts(instance: &serde_json::Value) -> bool {
    let schema = include_str!("../schemas/envelope.v1.json");
    let schema_json: serde_json::Value = serde_json::from_str(schema).unwrap();
    let schema_static: &'static serde_json::Value = Box::leak(Box::new(schema_json));
    let compiled = JSONSchema::options().compile(schema_static).unwrap();
    compiled.is_valid(instance)
}

fn validate_request() -> MessageEnvelope {
    MessageEnvelope::new(
        "orchestrator",
        "validator",
        TaskPayload::ValidateKey {
            key_type: "po".to_string(),
            key: "PO-1001".to_string(),
        },
    )
}

#[test]
fn request_envelope_is_valid() {
    let instance = serde_json::to_value(validate_request()).unwrap();
    assert!(schema_accepts(&instance));
    assert_eq!(instance["status"], "PENDING");
}

#[test]
fn report_request_and_result_are_valid() {
    let request = MessageEnvelope::new(
        "orchestrator",
        "reporter",
        TaskPayload::GenerateReport {
            report: ReportRequest {
                invoice: InvoiceData {
                    invoice_no: Some("INV-1".to_string()),
                    total_amount: Some(500.0),
                    ..Default::default()
                },
                validation_status: "PASS".to_string(),
                discrepancies: vec![],
            },
        },
    );
    let reply = request.reply(TaskPayload::ReportResult {
        html: "<h1>INV-1</h1>".to_string(),
    });

    assert!(schema_accepts(&serde_json::to_value(&request).unwrap()));
    let reply_json = serde_json::to_value(&reply).unwrap();
    assert!(schema_accepts(&reply_json));
    assert_eq!(reply_json["status"], "SUCCESS");
    assert_eq!(reply_json["payload"]["html"], "<h1>INV-1</h1>");
}

#[test]
fn error_reply_is_valid() {
    let reply = validate_request().reply_error("ERP unreachable");
    assert!(schema_accepts(&serde_json::to_value(reply).unwrap()));
}

#[test]
fn error_status_without_error_payload_is_rejected() {
    let mut invalid = serde_json::to_value(validate_request()).unwrap();
    invalid["status"] = json!("ERROR");
    assert!(!schema_accepts(&invalid), "ERROR status needs an error payload");
    // The deserializer agrees with the schema
    assert!(serde_json::from_value::<MessageEnvelope>(invalid).is_err());
}

#[test]
fn malformed_message_id_is_rejected() {
    let mut invalid = serde_json::to_value(validate_request()).unwrap();
    invalid["message_id"] = json!("not-a-uuid");
    assert!(!schema_accepts(&invalid));
}

#[test]
fn unknown_task_type_is_rejected() {
    let mut invalid = serde_json::to_value(validate_request()).unwrap();
    invalid["task_type"] = json!("SUMMARIZE");
    assert!(!schema_accepts(&invalid));
}
