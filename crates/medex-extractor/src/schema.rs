//! JSON Schema for one extracted record
//!
//! The document is built once per process and handed to the gateway as the
//! `med_item` response format on every call.

use medex_domain::ResponseFormat;
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Name the schema is registered under with the provider
pub const SCHEMA_NAME: &str = "med_item";

/// Every property a record may carry, in schema order
pub const RECORD_FIELDS: [&str; 8] = [
    "name",
    "brand",
    "concentration",
    "unit",
    "form",
    "quantity",
    "category",
    "additionalInfo",
];

static RECORD_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "brand": { "type": ["string", "null"] },
            "concentration": { "type": ["string", "null"] },
            "unit": {
                "type": ["string", "null"],
                "description": "Unit não pode conter números"
            },
            "form": {
                "type": ["string", "null"],
                "description": "Ex: Ampola, Bolsa, Comprimido"
            },
            "quantity": {
                "type": ["string", "null"],
                "description": "Ex: 4ML, 100ML, 40 unidades"
            },
            "category": { "type": ["string", "null"] },
            "additionalInfo": {
                "type": ["string", "null"],
                "description": "Qualquer outra informação relevante"
            }
        },
        "required": ["name"],
        "additionalProperties": false
    })
});

/// The record schema document
pub fn record_schema() -> &'static Value {
    &RECORD_SCHEMA
}

/// The record schema bound as a gateway response format
pub fn response_format() -> ResponseFormat {
    ResponseFormat::json_schema(SCHEMA_NAME, record_schema().clone())
}
