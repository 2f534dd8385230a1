//! Shared claim-chart types passed between segmentation, matching and judgment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One technical feature of a claim, as produced by [`crate::segment`].
///
/// `sequence` is 1-based within its claim and follows claim text order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub claim_number: String,
    pub sequence: u32,
    pub text: String,
}

impl Feature {
    /// Claim label in the form used by patent documents, e.g. `权利要求1`.
    pub fn claim_label(&self) -> String {
        format!("权利要求{}", self.claim_number)
    }
}

/// A reference document the features are compared against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonDocument {
    pub filename: String,
    pub content: String,
}

impl ComparisonDocument {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// One row of the claim chart: a (feature, document) pair.
///
/// The first five fields are filled by the matcher; `core_excerpt`,
/// `analysis_process` and `analysis_result` are filled by the judgment stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    pub claim_number: String,
    pub sequence: u32,
    pub feature_text: String,
    pub document_filename: String,
    pub related_excerpt: String,
    pub core_excerpt: String,
    pub analysis_process: String,
    pub analysis_result: String,
}

impl MatchRow {
    /// Row key; unique within one match result.
    pub fn key(&self) -> (&str, u32, &str) {
        (&self.claim_number, self.sequence, &self.document_filename)
    }

    /// Copy the judgment fields of `result` into this row.
    pub fn apply_judgment(&mut self, result: &JudgmentResult) {
        match result.status {
            JudgmentStatus::Success => {
                self.core_excerpt.clone_from(&result.core_content);
                self.analysis_process.clone_from(&result.analysis_process);
                self.analysis_result = format!(
                    "{} (similarity {:.0})",
                    result.is_disclosed, result.similarity
                );
            }
            JudgmentStatus::Error => {
                let message = result.message.as_deref().unwrap_or("analysis failed");
                self.analysis_result = format!("error: {message}");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgmentStatus {
    #[default]
    Success,
    Error,
}

/// Whether the reference document already teaches the feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disclosure {
    Yes,
    No,
    /// The model gave no recognisable conclusion.
    #[default]
    Pending,
}

impl Disclosure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for Disclosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    #[default]
    Text,
    ImageText,
}

/// Outcome of one LLM judgment of a feature against comparison content.
///
/// Never stored on its own; it is flattened into a [`MatchRow`] or handed
/// back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgmentResult {
    pub status: JudgmentStatus,
    #[serde(default)]
    pub related_content: String,
    #[serde(default)]
    pub core_content: String,
    #[serde(default)]
    pub analysis_process: String,
    #[serde(default)]
    pub is_disclosed: Disclosure,
    /// 0-100.
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub main_differences: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_docs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<AnalysisType>,
}

impl JudgmentResult {
    /// Error-status result carrying the failure text.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: JudgmentStatus::Error,
            message: Some(message.into()),
            similarity: 0.0,
            ..Default::default()
        }
    }

    /// Fallback used when a structured parse of `raw` is not possible:
    /// the whole reply becomes the analysis process.
    pub fn degraded(raw: &str) -> Self {
        Self {
            status: JudgmentStatus::Success,
            related_content: raw.chars().take(500).collect(),
            analysis_process: raw.to_string(),
            is_disclosed: Disclosure::Pending,
            similarity: 0.0,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JudgmentStatus::Success
    }
}
