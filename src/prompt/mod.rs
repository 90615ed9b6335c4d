//! Classification prompt assembly
//!
//! Renders the fixed instructional template with the tag vocabulary, per-tag
//! usage instructions, and the retrieved few-shot examples. Template
//! rendering is the one place the pipeline does NOT fail soft: a
//! substitution error means the prompt itself is wrong, which is a bug in
//! construction rather than a bad model response.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use crate::errors::{Result, TaggerError};
use crate::retrieval::FewShotExample;
use crate::taxonomy::Taxonomy;

/// Separator token between tag names in the vocabulary listing
pub const TAG_SEPARATOR: &str = "<tag_separator>";

/// Sentinel vocabulary when the taxonomy is empty
const NO_TAGS_SENTINEL: &str = "no_tags_are_available";

/// Sentinel text when no tag carries usage instructions
const NO_INSTRUCTIONS_SENTINEL: &str = "No instructions were provided to label tags.";

/// Sentinel text when retrieval produced no examples
const NO_EXAMPLES_SENTINEL: &str = "We do not have relevant examples.";

/// The fixed tagging prompt
///
/// `{quote_text}`, `{eligible_tags}`, `{tag_instructions}` and
/// `{few_shot_examples}` are filled in per request.
const QUOTE_TAGGING_TEMPLATE: &str = r#"
Context:
You are a user experience research tagging assistant, helping a research team identify valuable insights from participant quotes during interviews.

Instructions:

You will be given an input text formatted as follows:
<input_text>
{quote_text}
</input_text>

Your task is to identify relevant quotes and tag them accordingly. Provide your output in JSON format using the structure below:
[
    {
        "quote": "The specific text to be tagged",
        "tag": "The assigned tag for the quote",
        "confidence": "Score between 0 and 1 representing your confidence in the assigned tag"
    }
]
If no quotes need to be tagged, return an empty JSON array [] instead.
The JSON can include several quotes to be tagged.

You can only use the following tags (tags are separated with the placeholder '<tag_separator>'):
<tags>
{eligible_tags}
<tags>

Below are instructions on when certain tags should be applied. You can use these instructions in addition to examples to decide the appropriate tag:

<tag_instructions>
{tag_instructions}
<tag_instructions>

A few examples of quotes that have been manually tagged by experts:

<examples>
{few_shot_examples}
</examples>

The <input_text> may contain multiple quotes, and not all of it must be tagged. Focus on tagging parts that provide valuable insights for supporting user study analysis.

Under "quote" include the biggest chunk of consecutive text that belongs to the same tag: if two adjacent sentences both describe the household chore routine, return them as one quote tagged once, not as two separate entries with the same tag.

Your turn.
Only return the JSON output for the tag.

<input_text>
{quote_text}
</input_text>
"#;

/// Builds classification prompts for a fixed taxonomy
pub struct PromptBuilder {
    taxonomy: Arc<Taxonomy>,
    template: String,
}

impl PromptBuilder {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            template: QUOTE_TAGGING_TEMPLATE.to_string(),
        }
    }

    /// Use a custom template instead of the built-in one
    ///
    /// The template may reference `{quote_text}`, `{eligible_tags}`,
    /// `{tag_instructions}` and `{few_shot_examples}`; any other
    /// `{placeholder}` fails rendering.
    pub fn with_template(taxonomy: Arc<Taxonomy>, template: impl Into<String>) -> Self {
        Self {
            taxonomy,
            template: template.into(),
        }
    }

    /// Assemble the full prompt for one quote and its retrieved examples
    pub fn build(&self, quote: &str, examples: &[FewShotExample]) -> Result<String> {
        let few_shot_examples = if examples.is_empty() {
            NO_EXAMPLES_SENTINEL.to_string()
        } else {
            let rendered: Vec<String> = examples.iter().map(format_example).collect();
            format!("[{}]", rendered.join(", "))
        };

        let vocabulary = self.taxonomy.vocabulary();
        let eligible_tags = if vocabulary.is_empty() {
            NO_TAGS_SENTINEL.to_string()
        } else {
            vocabulary.join(TAG_SEPARATOR)
        };

        let values = HashMap::from([
            ("quote_text", quote.to_string()),
            ("eligible_tags", eligible_tags),
            ("tag_instructions", self.tag_instructions()),
            ("few_shot_examples", few_shot_examples),
        ]);

        render(&self.template, &values).map_err(|err| {
            error!(%err, "prompt template rendering failed");
            err
        })
    }

    /// Format the usage-instruction block for tags that carry instructions
    fn tag_instructions(&self) -> String {
        let blocks: Vec<String> = self
            .taxonomy
            .instructed()
            .map(|tag| {
                format!(
                    "<new_instruction>\nTag: {}\nInstructions of when to use: {}\n</new_instruction>",
                    tag.name, tag.instructions
                )
            })
            .collect();

        if blocks.is_empty() {
            NO_INSTRUCTIONS_SENTINEL.to_string()
        } else {
            blocks.join("\n\n")
        }
    }
}

/// Render one example as the JSON-object literal the template expects
fn format_example(example: &FewShotExample) -> String {
    format!(
        r#"{{"quote": "{}", "tag": "{}", "confidence": 1.0}}"#,
        example.quote, example.tag
    )
}

/// Substitute `{placeholder}` slots in a template
///
/// Only `{lower_snake_case}` spans are treated as placeholders; everything
/// else (JSON braces in the output-format example included) passes through
/// untouched. A placeholder with no matching value is an error.
fn render(template: &str, values: &HashMap<&str, String>) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        match after_open.find('}') {
            Some(close) if is_placeholder_name(&after_open[..close]) => {
                let name = &after_open[..close];
                match values.get(name) {
                    Some(value) => output.push_str(value),
                    None => {
                        return Err(TaggerError::PromptTemplate {
                            placeholder: name.to_string(),
                        })
                    }
                }
                rest = &after_open[close + 1..];
            }
            _ => {
                // Literal brace, not a placeholder
                output.push('{');
                rest = after_open;
            }
        }
    }

    output.push_str(rest);
    Ok(output)
}

fn is_placeholder_name(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::TagRecord;

    fn sample_taxonomy() -> Arc<Taxonomy> {
        Arc::new(Taxonomy::new(vec![
            TagRecord::new("Rules", "Kids phones", ""),
            TagRecord::new("Meal boxes", "Cooking", "have they used a meal kit delivery?"),
        ]))
    }

    fn sample_examples() -> Vec<FewShotExample> {
        vec![FewShotExample {
            quote: "we set a curfew".to_string(),
            tag: "rules".to_string(),
        }]
    }

    #[test]
    fn test_prompt_contains_quote_and_vocabulary() {
        let builder = PromptBuilder::new(sample_taxonomy());
        let prompt = builder.build("my kids text all night", &sample_examples()).unwrap();

        assert!(prompt.contains("my kids text all night"));
        assert!(prompt.contains(&format!("rules{}meal boxes", TAG_SEPARATOR)));
    }

    #[test]
    fn test_prompt_examples_rendered_as_array_literal() {
        let builder = PromptBuilder::new(sample_taxonomy());
        let prompt = builder.build("input", &sample_examples()).unwrap();

        assert!(prompt
            .contains(r#"[{"quote": "we set a curfew", "tag": "rules", "confidence": 1.0}]"#));
    }

    #[test]
    fn test_prompt_instruction_blocks() {
        let builder = PromptBuilder::new(sample_taxonomy());
        let prompt = builder.build("input", &[]).unwrap();

        assert!(prompt.contains("Tag: Meal boxes"));
        assert!(prompt.contains("have they used a meal kit delivery?"));
        // "Rules" has no instructions and must not get a block
        assert!(!prompt.contains("Tag: Rules"));
    }

    #[test]
    fn test_prompt_sentinels() {
        let empty = Arc::new(Taxonomy::new(Vec::new()));
        let builder = PromptBuilder::new(empty);
        let prompt = builder.build("", &[]).unwrap();

        assert!(prompt.contains(NO_TAGS_SENTINEL));
        assert!(prompt.contains(NO_INSTRUCTIONS_SENTINEL));
        assert!(prompt.contains(NO_EXAMPLES_SENTINEL));
    }

    #[test]
    fn test_empty_quote_renders_empty_input_block() {
        let builder = PromptBuilder::new(sample_taxonomy());
        let prompt = builder.build("", &[]).unwrap();
        assert!(prompt.contains("<input_text>\n\n</input_text>"));
    }

    #[test]
    fn test_unknown_placeholder_is_an_error() {
        let builder = PromptBuilder::with_template(
            sample_taxonomy(),
            "classify {quote_text} with {mystery_field}",
        );
        let err = builder.build("input", &[]).unwrap_err();

        match err {
            TaggerError::PromptTemplate { placeholder } => {
                assert_eq!(placeholder, "mystery_field")
            }
            other => panic!("expected PromptTemplate error, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_braces_pass_through() {
        let builder = PromptBuilder::with_template(
            sample_taxonomy(),
            r#"shape: [{ "quote": "..." }] input: {quote_text}"#,
        );
        let prompt = builder.build("hello", &[]).unwrap();
        assert!(prompt.contains(r#"[{ "quote": "..." }]"#));
        assert!(prompt.contains("input: hello"));
    }

    #[test]
    fn test_repeated_placeholder_substituted_everywhere() {
        let builder = PromptBuilder::new(sample_taxonomy());
        let prompt = builder.build("the same answer text", &[]).unwrap();
        assert_eq!(prompt.matches("the same answer text").count(), 2);
    }

    #[test]
    fn test_default_template_renders_json_shape_literally() {
        let builder = PromptBuilder::new(sample_taxonomy());
        let prompt = builder.build("input", &[]).unwrap();
        assert!(prompt.contains(r#""quote": "The specific text to be tagged""#));
    }
}
