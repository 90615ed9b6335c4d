//! End-to-end tagging pipeline
//!
//! Drives retrieve -> prompt -> invoke -> parse -> aggregate over a single
//! section, an ordered transcript, and a collection of transcripts keyed by
//! participant. Per-section failures (bad model output, timeouts, retrieval
//! errors) stay local to their section; only prompt construction failures
//! abort a batch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{Result, TaggerError};
use crate::index::SimilaritySearch;
use crate::model::GenerativeModel;
use crate::prompt::PromptBuilder;
use crate::response::parse_model_response;
use crate::retrieval::{ExampleRetriever, SearchParams};
use crate::table::{TableSchema, TagTable};
use crate::taxonomy::Taxonomy;
use crate::transcript::{Transcript, TranscriptSection};

/// Tagging pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerConfig {
    /// Example-retrieval parameters
    pub search: SearchParams,
    /// Minimum confidence for an assigned tag. Stored for downstream
    /// reporting but NOT applied as a filter anywhere in the pipeline:
    /// filtering would break row-count-preserving aggregation, so rows are
    /// handed back with whatever confidence the model reported.
    pub confidence_threshold: f64,
    /// Bound on concurrently processed sections within a transcript
    pub concurrency: usize,
    /// Per-call time limit for retrieval and model invocations
    pub request_timeout: Duration,
    /// Render progress bars while transcripts are processed
    pub show_progress: bool,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            search: SearchParams::default(),
            confidence_threshold: 0.7,
            concurrency: num_cpus::get(),
            request_timeout: Duration::from_secs(60),
            show_progress: true,
        }
    }
}

/// Retrieval-augmented transcript tagger
///
/// Holds the read-only taxonomy plus handles to the external collaborators:
/// the generative model and the two similarity indexes.
pub struct TranscriptTagger {
    taxonomy: Arc<Taxonomy>,
    model: Arc<dyn GenerativeModel>,
    retriever: ExampleRetriever,
    prompt_builder: PromptBuilder,
    config: TaggerConfig,
}

impl TranscriptTagger {
    /// Create a tagger with default configuration
    ///
    /// # Arguments
    /// * `taxonomy` - Expert-defined tag registry
    /// * `model` - Generative model used for classification
    /// * `quote_index` - Similarity index over previously tagged quotes
    /// * `tag_index` - Similarity index over tag labels
    /// * `quote_tags` - Ground-truth quote -> tag associations
    pub fn new(
        taxonomy: Taxonomy,
        model: Arc<dyn GenerativeModel>,
        quote_index: Arc<dyn SimilaritySearch>,
        tag_index: Arc<dyn SimilaritySearch>,
        quote_tags: HashMap<String, String>,
    ) -> Self {
        Self::with_config(
            taxonomy,
            model,
            quote_index,
            tag_index,
            quote_tags,
            TaggerConfig::default(),
        )
    }

    /// Create with custom configuration
    pub fn with_config(
        taxonomy: Taxonomy,
        model: Arc<dyn GenerativeModel>,
        quote_index: Arc<dyn SimilaritySearch>,
        tag_index: Arc<dyn SimilaritySearch>,
        quote_tags: HashMap<String, String>,
        config: TaggerConfig,
    ) -> Self {
        let taxonomy = Arc::new(taxonomy);
        let retriever =
            ExampleRetriever::with_params(quote_index, tag_index, quote_tags, config.search.clone());
        let prompt_builder = PromptBuilder::new(Arc::clone(&taxonomy));

        Self {
            taxonomy,
            model,
            retriever,
            prompt_builder,
            config,
        }
    }

    /// Replace the built-in prompt template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_builder = PromptBuilder::with_template(Arc::clone(&self.taxonomy), template);
        self
    }

    /// Tag a single transcript section
    ///
    /// Returns a transcript-schema table with zero or more rows. Retrieval
    /// and model failures degrade to an empty section; a prompt template
    /// failure is the only error this propagates.
    pub async fn tag_section(&self, section: &TranscriptSection) -> Result<TagTable> {
        let examples = match self
            .with_timeout(self.retriever.retrieve(&section.answer))
            .await
        {
            Ok(examples) => examples,
            Err(err) => {
                warn!(%err, "example retrieval failed, tagging without examples");
                Vec::new()
            }
        };

        let prompt = self.prompt_builder.build(&section.answer, &examples)?;

        let raw = match self.with_timeout(self.model.invoke(&prompt)).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "model invocation failed, section contributes no rows");
                return Ok(TagTable::empty(TableSchema::Transcript));
            }
        };

        let records = parse_model_response(raw.trim());
        Ok(TagTable::from_tagged_quotes(records, &self.taxonomy))
    }

    /// Tag every section of one transcript
    ///
    /// Sections are processed through a bounded concurrent stream and
    /// collected in input order, so output rows follow transcript order
    /// regardless of completion order.
    pub async fn tag_transcript(&self, transcript: &[TranscriptSection]) -> Result<TagTable> {
        let progress = self.progress_bar(transcript.len() as u64, "Tagging sections");

        let section_tables: Vec<TagTable> = stream::iter(transcript.iter().map(|section| {
            let progress = progress.clone();
            async move {
                let result = self.tag_section(section).await;
                progress.inc(1);
                result
            }
        }))
        .buffered(self.config.concurrency.max(1))
        .try_collect()
        .await?;

        progress.finish_and_clear();

        let mut table = TagTable::empty(TableSchema::Transcript);
        for section_table in section_tables {
            if !section_table.is_empty() {
                table.append(section_table);
            }
        }

        Ok(table)
    }

    /// Tag a collection of transcripts keyed by participant identifier
    ///
    /// Pairs are traversed in input order and every row of a transcript's
    /// results is stamped with its participant before concatenation.
    pub async fn tag_transcripts(
        &self,
        transcripts: &[(String, Transcript)],
    ) -> Result<TagTable> {
        let progress = self.progress_bar(transcripts.len() as u64, "Tagging transcripts");

        let mut table = TagTable::empty(TableSchema::Collection);
        for (participant, transcript) in transcripts {
            progress.set_message(format!("Participant {}", participant));
            let transcript_table = self.tag_transcript(transcript).await?;
            if !transcript_table.is_empty() {
                table.append(transcript_table.with_participant(participant));
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(table)
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TaggerError::Timeout {
                duration_ms: self.config.request_timeout.as_millis() as u64,
            }),
        }
    }

    fn progress_bar(&self, len: u64, message: &'static str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_message(message);
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use crate::taxonomy::{TagRecord, NO_TAG_GROUP};
    use async_trait::async_trait;

    /// Model that always answers with the same payload
    struct StaticModel {
        response: String,
    }

    #[async_trait]
    impl GenerativeModel for StaticModel {
        async fn invoke(&self, _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    /// Model that stalls longer than any test timeout
    struct StalledModel;

    #[async_trait]
    impl GenerativeModel for StalledModel {
        async fn invoke(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("[]".to_string())
        }
    }

    fn test_config() -> TaggerConfig {
        TaggerConfig {
            show_progress: false,
            ..Default::default()
        }
    }

    fn tagger_with(model: Arc<dyn GenerativeModel>, config: TaggerConfig) -> TranscriptTagger {
        let taxonomy = Taxonomy::new(vec![
            TagRecord::new("Rules", "Kids phones", ""),
            TagRecord::new("Monitoring", "Kids phones", ""),
        ]);
        let quote_tags: HashMap<String, String> =
            [("we set a curfew on school nights", "Rules")]
                .into_iter()
                .map(|(q, t)| (q.to_string(), t.to_string()))
                .collect();

        TranscriptTagger::with_config(
            taxonomy,
            model,
            Arc::new(InMemoryIndex::new(vec![
                "we set a curfew on school nights".to_string(),
            ])),
            Arc::new(InMemoryIndex::new(vec!["Rules".to_string()])),
            quote_tags,
            config,
        )
    }

    #[test]
    fn test_config_default() {
        let config = TaggerConfig::default();
        assert_eq!(config.search.k, 5);
        assert_eq!(config.confidence_threshold, 0.7);
        assert!(config.show_progress);
    }

    #[tokio::test]
    async fn test_tag_section_resolves_group() {
        let model = Arc::new(StaticModel {
            response: r#"[{"quote":"we set a curfew","tag":"rules","confidence":0.9}]"#
                .to_string(),
        });
        let tagger = tagger_with(model, test_config());

        let section = TranscriptSection::new("Any phone rules?", "we set a curfew");
        let table = tagger.tag_section(&section).await.unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].tag, "rules");
        assert_eq!(table.rows()[0].tag_group, "Kids phones");
        assert_eq!(table.rows()[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn test_tag_section_empty_array_response() {
        let model = Arc::new(StaticModel {
            response: "  []  ".to_string(),
        });
        let tagger = tagger_with(model, test_config());

        let section = TranscriptSection::new("", "nothing of note");
        let table = tagger.tag_section(&section).await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_tag_section_unknown_tag_sentinel() {
        let model = Arc::new(StaticModel {
            response: r#"[{"quote":"q","tag":"Zzz-unknown","confidence":0.4}]"#.to_string(),
        });
        let tagger = tagger_with(model, test_config());

        let table = tagger
            .tag_section(&TranscriptSection::new("", "whatever"))
            .await
            .unwrap();
        assert_eq!(table.rows()[0].tag_group, NO_TAG_GROUP);
    }

    #[tokio::test]
    async fn test_model_timeout_is_local_to_section() {
        let config = TaggerConfig {
            request_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let tagger = tagger_with(Arc::new(StalledModel), config);

        let table = tagger
            .tag_section(&TranscriptSection::new("", "anything"))
            .await
            .unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_failure_propagates() {
        let model = Arc::new(StaticModel {
            response: "[]".to_string(),
        });
        let tagger =
            tagger_with(model, test_config()).with_template("tag this: {nonexistent_slot}");

        let err = tagger
            .tag_section(&TranscriptSection::new("", "anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaggerError::PromptTemplate { .. }));
    }

    #[tokio::test]
    async fn test_transcript_concatenates_in_order() {
        let model = Arc::new(StaticModel {
            response: r#"[{"quote":"row","tag":"rules","confidence":1.0}]"#.to_string(),
        });
        let tagger = tagger_with(model, test_config());

        let transcript = vec![
            TranscriptSection::new("q1", "first answer"),
            TranscriptSection::new("q2", "second answer"),
            TranscriptSection::new("q3", "third answer"),
        ];
        let table = tagger.tag_transcript(&transcript).await.unwrap();
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_transcript_returns_typed_table() {
        let model = Arc::new(StaticModel {
            response: "[]".to_string(),
        });
        let tagger = tagger_with(model, test_config());

        let table = tagger.tag_transcript(&[]).await.unwrap();
        assert!(table.is_empty());
        assert_eq!(table.schema(), TableSchema::Transcript);
    }

    #[tokio::test]
    async fn test_collection_stamps_participants() {
        let model = Arc::new(StaticModel {
            response: r#"[{"quote":"row","tag":"rules","confidence":1.0}]"#.to_string(),
        });
        let tagger = tagger_with(model, test_config());

        let transcripts = vec![
            ("P1".to_string(), vec![TranscriptSection::new("", "a")]),
            ("P2".to_string(), vec![TranscriptSection::new("", "b")]),
        ];
        let table = tagger.tag_transcripts(&transcripts).await.unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].participant.as_deref(), Some("P1"));
        assert_eq!(table.rows()[1].participant.as_deref(), Some("P2"));
    }

    #[tokio::test]
    async fn test_empty_collection_keeps_collection_schema() {
        let model = Arc::new(StaticModel {
            response: "[]".to_string(),
        });
        let tagger = tagger_with(model, test_config());

        let table = tagger.tag_transcripts(&[]).await.unwrap();
        assert!(table.is_empty());
        assert_eq!(
            table.headers(),
            ["Quote", "Tag", "Confidence", "Tag Group", "Participant"]
        );
    }
}
