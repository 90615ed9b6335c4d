//! Model response validation and parsing
//!
//! Bad model output is expected and recoverable: anything that is not a
//! JSON array of quote/tag/confidence objects degrades to an empty result
//! set instead of an error. Parsing never raises to the caller.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// One (quote, tag, confidence) record as emitted by the model
///
/// The tag is taken as-is and may name something outside the taxonomy;
/// confidence is not range-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedQuote {
    pub quote: String,
    pub tag: String,
    #[serde(deserialize_with = "confidence_from_number_or_string")]
    pub confidence: f64,
}

impl TaggedQuote {
    /// Fixed columns of the parsed result set
    pub const COLUMNS: [&'static str; 3] = ["quote", "tag", "confidence"];
}

/// Parse raw model text into tagged-quote records
///
/// Empty input and the empty-array literal are valid "nothing to tag"
/// responses. Any parse failure also yields the empty, well-typed result.
pub fn parse_model_response(raw: &str) -> Vec<TaggedQuote> {
    if raw.is_empty() || raw == "[]" {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<TaggedQuote>>(raw) {
        Ok(records) => records,
        Err(err) => {
            debug!(%err, "discarding unparseable model response");
            Vec::new()
        }
    }
}

/// Accept confidence as a JSON number or a numeric string
///
/// The prompt's output-format example types confidence as a string, and
/// models follow it inconsistently.
fn confidence_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid confidence: {:?}", text))),
    }
}
