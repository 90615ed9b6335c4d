//! Transcript input types
//!
//! Sections are produced by the surrounding document-parsing tooling and
//! consumed here read-only. An answer can arrive without a question (opening
//! remarks before the interviewer has said anything).

use serde::{Deserialize, Serialize};

/// One question/answer unit extracted from an interview document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSection {
    /// Interviewer question; empty when the answer had none
    pub question: String,
    /// Participant answer, the text the pipeline classifies
    pub answer: String,
}

impl TranscriptSection {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// An ordered interview transcript for a single participant
pub type Transcript = Vec<TranscriptSection>;
