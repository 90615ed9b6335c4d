//! Retrieval engine for few-shot example selection

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::index::SimilaritySearch;

/// Search parameters for example retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Nearest-neighbor count per similarity query
    pub k: usize,
    /// Maximum example quotes pulled in per related tag
    pub per_tag_limit: usize,
    /// Hard cap on the total number of examples returned
    pub max_examples: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            k: 5,
            per_tag_limit: 3,
            max_examples: 20,
        }
    }
}

/// A previously tagged quote used as an in-context demonstration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub quote: String,
    pub tag: String,
}

/// Retrieval engine over a quote index, a tag index, and the ground-truth
/// quote -> tag associations
///
/// Every example this engine returns corresponds to a real prior quote-tag
/// association; nothing is fabricated. The capped result list is NOT
/// deduplicated, so overlapping examples may repeat.
pub struct ExampleRetriever {
    quote_index: Arc<dyn SimilaritySearch>,
    tag_index: Arc<dyn SimilaritySearch>,
    quote_tags: HashMap<String, String>,
    tag_quotes: HashMap<String, Vec<String>>,
    params: SearchParams,
}

impl ExampleRetriever {
    pub fn new(
        quote_index: Arc<dyn SimilaritySearch>,
        tag_index: Arc<dyn SimilaritySearch>,
        quote_tags: HashMap<String, String>,
    ) -> Self {
        Self::with_params(quote_index, tag_index, quote_tags, SearchParams::default())
    }

    pub fn with_params(
        quote_index: Arc<dyn SimilaritySearch>,
        tag_index: Arc<dyn SimilaritySearch>,
        quote_tags: HashMap<String, String>,
        params: SearchParams,
    ) -> Self {
        // Invert the association map once. Keys are visited in sorted order
        // so the per-tag quote lists come out identical across runs.
        let mut entries: Vec<(&String, &String)> = quote_tags.iter().collect();
        entries.sort();

        let mut tag_quotes: HashMap<String, Vec<String>> = HashMap::new();
        for (quote, tag) in entries {
            tag_quotes
                .entry(tag.to_lowercase())
                .or_default()
                .push(quote.clone());
        }

        Self {
            quote_index,
            tag_index,
            quote_tags,
            tag_quotes,
            params,
        }
    }

    /// Retrieve up to `max_examples` few-shot examples for a text span
    ///
    /// Direct nearest-neighbor results come first, then the related-tag
    /// expansion, truncated at the cap.
    pub async fn retrieve(&self, span: &str) -> Result<Vec<FewShotExample>> {
        let mut examples = self.examples_from_quote(span).await?;

        let direct_tags: Vec<String> = {
            let mut seen = HashSet::new();
            examples
                .iter()
                .filter(|example| seen.insert(example.tag.clone()))
                .map(|example| example.tag.clone())
                .collect()
        };

        let related = self.examples_from_tags(&direct_tags).await?;
        examples.extend(related);
        examples.truncate(self.params.max_examples);

        Ok(examples)
    }

    /// Direct retrieval: nearest stored quotes with their ground-truth tags
    ///
    /// Hits with no quote -> tag association are skipped.
    async fn examples_from_quote(&self, span: &str) -> Result<Vec<FewShotExample>> {
        let hits = self
            .quote_index
            .similarity_search(span, self.params.k)
            .await?;

        let examples = hits
            .into_iter()
            .filter_map(|hit| {
                self.quote_tags.get(&hit.content).map(|tag| FewShotExample {
                    quote: hit.content,
                    tag: tag.clone(),
                })
            })
            .collect();

        Ok(examples)
    }

    /// Expansion: quotes previously filed under tags semantically related to
    /// the direct-retrieval tags
    async fn examples_from_tags(&self, tags: &[String]) -> Result<Vec<FewShotExample>> {
        // Deduplicated, case-folded, insertion-ordered so expansion output
        // is deterministic for a deterministic tag index
        let mut seen = HashSet::new();
        let mut related_tags = Vec::new();

        for tag in tags {
            let hits = self.tag_index.similarity_search(tag, self.params.k).await?;
            for hit in hits {
                let related = hit.content.to_lowercase();
                if seen.insert(related.clone()) {
                    related_tags.push(related);
                }
            }
        }

        let mut examples = Vec::new();
        for tag in &related_tags {
            let Some(quotes) = self.tag_quotes.get(tag) else {
                continue;
            };
            for quote in quotes.iter().take(self.params.per_tag_limit) {
                examples.push(FewShotExample {
                    quote: quote.clone(),
                    tag: tag.clone(),
                });
            }
        }

        Ok(examples)
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }
}
