//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap their answer in code fences or surround it with prose.
//! Fences are stripped first, then the outermost `{...}` is parsed.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

use super::types::{ColumnDetection, SalesClassification};

const RAW_PREVIEW_LEN: usize = 200;

/// Remove a surrounding ```json / ``` fence
pub fn strip_fences(response: &str) -> &str {
    let t = response.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```JSON"))
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}

/// Extract and deserialize the JSON object in a model response
pub fn extract_json<T: DeserializeOwned>(response: &str) -> Result<T> {
    let response = strip_fences(response);
    if response.is_empty() {
        return Err(Error::InvalidData("Empty AI response".into()));
    }

    match (response.find('{'), response.rfind('}')) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!(
                    "Invalid JSON from AI: {} | Raw: {}",
                    e,
                    truncate(json_str)
                ))
            })
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response)
        ))),
    }
}

/// Parse a header/column detection answer
pub fn parse_column_detection(response: &str) -> Result<ColumnDetection> {
    let mut detection: ColumnDetection = extract_json(response)?;
    detection.sales_column = detection.sales_column.trim().to_string();
    detection.bill_column = detection.bill_column.trim().to_string();
    Ok(detection)
}

/// Parse a sales classification answer
pub fn parse_sales_classification(response: &str) -> Result<SalesClassification> {
    let mut classification: SalesClassification = extract_json(response)?;
    classification.confidence = if classification.confidence.is_finite() {
        classification.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    Ok(classification)
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(RAW_PREVIEW_LEN) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_column_detection_fenced() {
        let response = "```json\n{\"header_row_index\": 2, \"sales_column\": \" Net Amt \", \"bill_column\": \"Bill No\"}\n```";
        let detection = parse_column_detection(response).unwrap();
        assert_eq!(detection.header_row_index, 2);
        assert_eq!(detection.sales_column, "Net Amt");
        assert_eq!(detection.bill_column, "Bill No");
    }

    #[test]
    fn test_parse_column_detection_with_prose() {
        let response = "Sure! Here you go: {\"header_row_index\": 0, \"sales_column\": \"Amount\", \"bill_column\": \"Invoice\"} Hope that helps.";
        let detection = parse_column_detection(response).unwrap();
        assert_eq!(detection.sales_column, "Amount");
    }

    #[test]
    fn test_parse_column_detection_failures() {
        assert!(matches!(
            parse_column_detection(""),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            parse_column_detection("```json\n```"),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            parse_column_detection("I could not find the header"),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            parse_column_detection("{\"sales_column\": \"Amount\"}"),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            parse_column_detection("{not json}"),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_parse_sales_classification() {
        let c = parse_sales_classification("{\"is_sales\": true, \"confidence\": 1.7}").unwrap();
        assert!(c.is_sales);
        assert_eq!(c.confidence, 1.0);

        let c = parse_sales_classification("{\"is_sales\": false}").unwrap();
        assert!(!c.is_sales);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let long = "₹".repeat(300);
        let t = truncate(&long);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), RAW_PREVIEW_LEN + 3);
    }
}
