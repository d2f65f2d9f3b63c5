//! Structured score document produced by the scoring provider
//!
//! Fixed schema with required fields; unrecognized provider fields are
//! preserved verbatim in `extra` rather than dropped.

use serde::{Deserialize, Serialize};

/// Valid inclusive range for scores
const SCORE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

/// AI-generated scoring document for a completed attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDocument {
    /// Overall score, 0..=100
    pub overall_score: f64,
    /// Free-text overall feedback
    pub overall_feedback: String,
    /// Per-question summaries, in question order
    pub question_summaries: Vec<QuestionSummary>,
    /// Extension fields the provider may add (sentiment, hiring signal, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Summary of the candidate's handling of one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub question: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ScoreDocument {
    /// Parse and validate a raw provider document
    ///
    /// Validation happens here, immediately after parsing, so a document
    /// that deserializes but violates the schema contract never reaches
    /// storage. Failures are permanent: retrying the same prompt is not
    /// assumed to yield a parseable result.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let document: ScoreDocument = serde_json::from_str(raw)
            .map_err(|e| format!("score document is not valid JSON: {}", e))?;
        document.validate()?;
        Ok(document)
    }

    /// Validate required fields and ranges
    pub fn validate(&self) -> Result<(), String> {
        if !self.overall_score.is_finite() || !SCORE_RANGE.contains(&self.overall_score) {
            return Err(format!(
                "overall_score {} outside valid range 0..=100",
                self.overall_score
            ));
        }
        if self.question_summaries.is_empty() {
            return Err("question_summaries may not be empty".to_string());
        }
        for (idx, qs) in self.question_summaries.iter().enumerate() {
            if let Some(score) = qs.score {
                if !score.is_finite() || !SCORE_RANGE.contains(&score) {
                    return Err(format!(
                        "question_summaries[{}].score {} outside valid range 0..=100",
                        idx, score
                    ));
                }
            }
        }
        Ok(())
    }
}
