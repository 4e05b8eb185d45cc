//! Parse model output into an extracted record

use crate::types::ExtractedRecord;
use serde_json::Value;

/// Parse and validate one model response against the record schema
///
/// The error string describes why the text is not a valid record; callers
/// classify it as a schema violation.
pub fn parse_record(response: &str) -> Result<ExtractedRecord, String> {
    // Structured output should already be bare JSON, but some deployments
    // still wrap it in a markdown code block
    let json_str = extract_json(response)?;

    let json: Value =
        serde_json::from_str(json_str).map_err(|e| format!("JSON parse error: {}", e))?;

    if !json.is_object() {
        return Err("Expected JSON object".to_string());
    }

    let record: ExtractedRecord =
        serde_json::from_value(json).map_err(|e| format!("Schema mismatch: {}", e))?;

    if record.name.trim().is_empty() {
        return Err("name is empty".to_string());
    }

    Ok(record)
}

/// Extract JSON from response, handling markdown code blocks
fn extract_json(response: &str) -> Result<&str, String> {
    let trimmed = response.trim();

    if !trimmed.starts_with("```") {
        return Ok(trimmed);
    }

    // Skip the opening fence line (```json or ```) and the closing fence
    let body = trimmed
        .split_once('\n')
        .map(|(_, rest)| rest)
        .ok_or_else(|| "Empty code block".to_string())?;
    Ok(body.trim_end().trim_end_matches("```").trim())
}
