//! Structuring of raw text into the knowledge schema.
//!
//! One Gemini call per input, driven by the structuring template. Model
//! output is treated as untrusted text: the JSON object is dug out
//! defensively, and parse failures are reported, never propagated as
//! panics.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};
use crate::integrations::GeminiClient;
use crate::knowledge::record::{KnowledgeRecord, SourceType};
use crate::prompts::Prompt;

/// Placeholder the raw input is substituted into.
const RAW_TEXT_PLACEHOLDER: &str = "{raw_text}";

/// Turns raw text into structured knowledge records.
#[derive(Debug, Clone)]
pub struct StructuringClient {
    gemini: GeminiClient,
    template: String,
}

impl StructuringClient {
    /// Create the client, loading the instruction template once.
    /// A missing template aborts startup.
    pub fn new(gemini: GeminiClient) -> Result<Self> {
        let template = Prompt::Structuring.load()?;
        if !template.contains(RAW_TEXT_PLACEHOLDER) {
            return Err(Error::PromptNotFound(format!(
                "{} lacks the {} placeholder",
                Prompt::Structuring.filename(),
                RAW_TEXT_PLACEHOLDER
            )));
        }
        Ok(Self { gemini, template })
    }

    /// Structure one piece of raw text.
    ///
    /// The returned record always carries the verbatim input as
    /// `original_text` and the caller's `source` label, regardless of
    /// what the model echoed.
    pub async fn structure(&self, raw_text: &str, source: SourceType) -> Result<KnowledgeRecord> {
        if raw_text.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "cannot structure empty text".to_string(),
            ));
        }

        let prompt = self.template.replace(RAW_TEXT_PLACEHOLDER, raw_text);
        let output = self.gemini.generate(&prompt).await?;

        let json_block = extract_json_block(&output).ok_or_else(|| {
            warn!(raw_output = %output, "No JSON object found in structuring output");
            Error::MalformedResponse("no JSON object in model output".to_string())
        })?;

        let mut record: KnowledgeRecord = serde_json::from_str(json_block).map_err(|e| {
            warn!(raw_output = %output, "Structuring output failed to parse: {}", e);
            Error::MalformedResponse(format!("structuring output did not match schema: {}", e))
        })?;

        record.core_content.original_text = raw_text.to_string();
        record.source_and_context.source_type = source;
        record.validate()?;

        Ok(record)
    }
}

/// Locate a JSON object inside free-form model output.
///
/// Prefers a fenced ```json block; otherwise scans for the first
/// balanced `{...}`, since models like to wrap the object in prose.
pub fn extract_json_block(output: &str) -> Option<&str> {
    static FENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid fence regex")
    });

    if let Some(caps) = FENCE.captures(output) {
        return caps.get(1).map(|m| m.as_str());
    }

    balanced_object(output)
}

/// First balanced top-level `{...}` in the text, string-aware.
fn balanced_object(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let bytes = output.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&output[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
