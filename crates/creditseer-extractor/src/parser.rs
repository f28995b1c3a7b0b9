//! Parse model output into raw block and value candidates
//!
//! JSON is expected. Models still wrap it in code fences, or ignore the
//! response format and answer in the line protocol, so both are accepted.

use crate::error::ExtractorError;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// A Stage 1 block as reported by the model, not yet verified
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    /// Schema block id
    #[serde(alias = "block_id", alias = "BlockId")]
    pub block_id: String,
    /// Value type tag
    #[serde(alias = "value_type", alias = "ValueType")]
    pub value_type: String,
    /// Claimed verbatim text
    #[serde(alias = "blockText", alias = "block_text", alias = "BlockText")]
    pub text: String,
}

/// A Stage 2 value as reported by the model, not yet verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    /// Block the value claims to come from
    pub block_id: Option<String>,
    /// Field name
    pub field: String,
    /// Value text
    pub value: String,
    /// Reported confidence label
    pub confidence: Option<String>,
}

/// A response item that could not be read as a block or value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    /// Position in the response array
    pub index: usize,
    /// Why the item was rejected
    pub reason: String,
    /// The item as JSON text
    pub raw: String,
}

/// Items read from a response, plus the ones that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse<T> {
    /// Items that parsed
    pub items: Vec<T>,
    /// Items that did not
    pub skipped: Vec<SkippedItem>,
}

impl<T> ParsedResponse<T> {
    fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            skipped: Vec::new(),
        }
    }
}

/// Parse a Stage 1 response
pub fn parse_stage1_response(response: &str) -> Result<ParsedResponse<RawBlock>, ExtractorError> {
    let body = extract_json(response);
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            let mut parsed = ParsedResponse::complete(Vec::new());
            for (index, item) in items(json, "blocks")?.into_iter().enumerate() {
                let raw = item.to_string();
                match serde_json::from_value::<RawBlock>(item) {
                    Ok(block) => parsed.items.push(block),
                    Err(e) => {
                        warn!("Skipping block {} in response: {}", index, e);
                        parsed.skipped.push(SkippedItem {
                            index,
                            reason: e.to_string(),
                            raw,
                        });
                    }
                }
            }
            Ok(parsed)
        }
        Err(e) => {
            debug!("Stage 1 response is not JSON ({}), trying line protocol", e);
            parse_stage1_lines(response).map(ParsedResponse::complete)
        }
    }
}

/// Parse a Stage 2 response
pub fn parse_stage2_response(response: &str) -> Result<ParsedResponse<RawValue>, ExtractorError> {
    let body = extract_json(response);
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            let mut parsed = ParsedResponse::complete(Vec::new());
            for (index, item) in items(json, "values")?.into_iter().enumerate() {
                match raw_values(&item) {
                    Ok(mut values) => parsed.items.append(&mut values),
                    Err(reason) => {
                        warn!("Skipping value {} in response: {}", index, reason);
                        parsed.skipped.push(SkippedItem {
                            index,
                            reason,
                            raw: item.to_string(),
                        });
                    }
                }
            }
            Ok(parsed)
        }
        Err(e) => {
            debug!("Stage 2 response is not JSON ({}), trying line protocol", e);
            parse_stage2_lines(response).map(ParsedResponse::complete)
        }
    }
}

/// Strip a markdown code fence around the JSON body, if any
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the fence line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// The array under `key`, or the document itself when it is a bare array
fn items(json: Value, key: &str) -> Result<Vec<Value>, ExtractorError> {
    match json {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(ExtractorError::InvalidFormat(format!(
                "'{}' is not an array",
                key
            ))),
            None => Err(ExtractorError::InvalidFormat(format!(
                "Expected an object with '{}'",
                key
            ))),
        },
        _ => Err(ExtractorError::InvalidFormat(format!(
            "Expected a JSON object with '{}' or an array",
            key
        ))),
    }
}

fn raw_values(item: &Value) -> Result<Vec<RawValue>, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| "Value is not a JSON object".to_string())?;
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    };

    let field = text(&["field", "fieldName", "name"])
        .ok_or_else(|| "Missing or invalid 'field'".to_string())?;
    let block_id = text(&["blockId", "block_id"]).filter(|s| !s.trim().is_empty());
    let confidence = text(&["confidence"]);

    let values: Vec<String> = match obj.get("value") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(list)) => list
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::Number(n)) => vec![n.to_string()],
        Some(Value::Bool(b)) => vec![b.to_string()],
        _ => return Err("Missing or invalid 'value'".to_string()),
    };

    Ok(values
        .into_iter()
        .map(|value| RawValue {
            block_id: block_id.clone(),
            field: field.clone(),
            value,
            confidence: confidence.clone(),
        })
        .collect())
}

/// `BlockId:` / `ValueType:` / `BlockText:` records; text runs until the next record
fn parse_stage1_lines(response: &str) -> Result<Vec<RawBlock>, ExtractorError> {
    let mut blocks: Vec<RawBlock> = Vec::new();
    let mut current: Option<RawBlock> = None;
    let mut collecting = false;

    for line in response.lines() {
        let stripped = line.trim();
        if let Some(id) = stripped.strip_prefix("BlockId:") {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(RawBlock {
                block_id: id.trim().to_string(),
                value_type: String::new(),
                text: String::new(),
            });
            collecting = false;
        } else if let Some(value_type) = stripped.strip_prefix("ValueType:") {
            if let Some(block) = current.as_mut() {
                block.value_type = value_type.trim().to_string();
            }
            collecting = false;
        } else if let Some(text) = stripped.strip_prefix("BlockText:") {
            if let Some(block) = current.as_mut() {
                block.text = text.trim().to_string();
                collecting = true;
            }
        } else if collecting {
            if let Some(block) = current.as_mut() {
                if !block.text.is_empty() {
                    block.text.push('\n');
                }
                block.text.push_str(line);
            }
        }
    }
    if let Some(block) = current {
        blocks.push(block);
    }

    if blocks.is_empty() {
        return Err(ExtractorError::InvalidFormat(
            "Response is neither JSON nor BlockId records".to_string(),
        ));
    }
    for block in &mut blocks {
        block.text = block.text.trim_end().to_string();
    }
    Ok(blocks)
}

/// `BlockId:` headers followed by `field: value [| confidence]` lines
fn parse_stage2_lines(response: &str) -> Result<Vec<RawValue>, ExtractorError> {
    let mut values = Vec::new();
    let mut block_id: Option<String> = None;

    for line in response.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if let Some(id) = stripped.strip_prefix("BlockId:") {
            block_id = Some(id.trim().to_string()).filter(|s| !s.is_empty());
            continue;
        }
        let Some((field, rest)) = stripped.split_once(':') else {
            continue;
        };
        let field = field.trim();
        if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }
        let (value, confidence) = split_confidence(rest.trim());
        values.push(RawValue {
            block_id: block_id.clone(),
            field: field.to_string(),
            value: value.to_string(),
            confidence: confidence.map(str::to_string),
        });
    }

    if values.is_empty() {
        return Err(ExtractorError::InvalidFormat(
            "Response is neither JSON nor field lines".to_string(),
        ));
    }
    Ok(values)
}

fn split_confidence(rest: &str) -> (&str, Option<&str>) {
    match rest.rsplit_once('|') {
        Some((value, label)) if !label.trim().is_empty() && !label.trim().contains(' ') => {
            (value.trim(), Some(label.trim()))
        }
        _ => (rest, None),
    }
}
