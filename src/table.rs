//! Result tables and group aggregation
//!
//! The model's parsed records become rows with their taxonomy group
//! attached; rows accumulate into per-transcript and per-collection tables.
//! Aggregation is row-count preserving: nothing is filtered or deduplicated
//! on the way through.

use serde::{Deserialize, Serialize};

use crate::response::TaggedQuote;
use crate::taxonomy::Taxonomy;

/// Columns of a per-section or per-transcript table
pub const TRANSCRIPT_COLUMNS: [&str; 4] = ["Quote", "Tag", "Confidence", "Tag Group"];

/// Columns of a multi-transcript (collection) table
pub const COLLECTION_COLUMNS: [&str; 5] =
    ["Quote", "Tag", "Confidence", "Tag Group", "Participant"];

/// Which column set a table exposes
///
/// Empty tables keep their full schema; a run that tags nothing still hands
/// back the well-typed table its caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableSchema {
    /// `Quote, Tag, Confidence, Tag Group`
    Transcript,
    /// `Quote, Tag, Confidence, Tag Group, Participant`
    Collection,
}

impl TableSchema {
    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            TableSchema::Transcript => &TRANSCRIPT_COLUMNS,
            TableSchema::Collection => &COLLECTION_COLUMNS,
        }
    }
}

/// One aggregated result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub quote: String,
    pub tag: String,
    pub confidence: f64,
    pub tag_group: String,
    /// Present only in collection-level tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// Tabular result accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTable {
    schema: TableSchema,
    rows: Vec<ResultRow>,
}

impl TagTable {
    /// An empty table that still carries its full column schema
    pub fn empty(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Build a transcript-level table from parsed model records, resolving
    /// each row's tag group case-insensitively (sentinel when unresolved)
    pub fn from_tagged_quotes(records: Vec<TaggedQuote>, taxonomy: &Taxonomy) -> Self {
        let rows = records
            .into_iter()
            .map(|record| {
                let tag_group = taxonomy.group_or_default(&record.tag).to_string();
                ResultRow {
                    quote: record.quote,
                    tag: record.tag,
                    confidence: record.confidence,
                    tag_group,
                    participant: None,
                }
            })
            .collect();

        Self {
            schema: TableSchema::Transcript,
            rows,
        }
    }

    /// Stamp every row with a participant identifier, widening the schema
    /// to the collection column set
    pub fn with_participant(mut self, participant: &str) -> Self {
        for row in &mut self.rows {
            row.participant = Some(participant.to_string());
        }
        self.schema = TableSchema::Collection;
        self
    }

    /// Append another table's rows, preserving their order
    pub fn append(&mut self, other: TagTable) {
        self.rows.extend(other.rows);
    }

    pub fn schema(&self) -> TableSchema {
        self.schema
    }

    pub fn headers(&self) -> &'static [&'static str] {
        self.schema.headers()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
