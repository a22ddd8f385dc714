use serde_json::Value;
use tracing::debug;

use crate::error::AppError;

const FENCE: &str = "```";

/// Extracts a JSON object from an LLM response.
///
/// A response may be bare JSON or carry the object inside fenced blocks
/// (optionally tagged `json`) surrounded by prose. The first fenced block that
/// holds a well-formed object wins; without fences the whole trimmed text must
/// parse.
pub fn parse_json_possibly_fenced(content: &str) -> Result<Value, AppError> {
    let blocks = fenced_blocks(content);

    if blocks.is_empty() {
        debug!("No fenced block detected, parsing response as JSON");
        return parse_object(content.trim());
    }

    for block in &blocks {
        if let Ok(value) = parse_object(block) {
            return Ok(value);
        }
    }

    Err(AppError::LLMParsing(format!(
        "none of the {} fenced blocks held a JSON object",
        blocks.len()
    )))
}

fn parse_object(candidate: &str) -> Result<Value, AppError> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(AppError::LLMParsing("response JSON is not an object".into())),
        Err(e) => Err(AppError::LLMParsing(format!("failed to parse response as JSON: {e}"))),
    }
}

/// Bodies of complete fenced blocks, in order. Blocks tagged with a language
/// other than `json` are skipped.
fn fenced_blocks(content: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = content;

    while let Some(open) = rest.find(FENCE) {
        let after_open = rest.get(open + FENCE.len()..).unwrap_or_default();
        let Some(close) = after_open.find(FENCE) else {
            break;
        };
        let inner = after_open.get(..close).unwrap_or_default();
        rest = after_open.get(close + FENCE.len()..).unwrap_or_default();

        let (tag, body) = match inner.split_once('\n') {
            Some((first, remainder)) if !first.trim_start().starts_with('{') => {
                (first.trim(), remainder)
            }
            _ => match inner.trim_start().strip_prefix("json") {
                Some(remainder) => ("json", remainder),
                None => ("", inner),
            },
        };
        if tag.is_empty() || tag.eq_ignore_ascii_case("json") {
            blocks.push(body.trim());
        }
    }

    blocks
}
