//! Cross-product matching of features against comparison documents.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::ChartError;
use crate::model::{ComparisonDocument, Feature, MatchRow};
use crate::relevance::{DEFAULT_MAX_LENGTH, find_relevant};

/// Rows produced by [`match_features`] with a status message.
///
/// On a precondition failure `rows` is empty and `error` says why.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub rows: Vec<MatchRow>,
    pub message: String,
    pub error: Option<ChartError>,
}

impl MatchOutcome {
    fn failed(error: ChartError) -> Self {
        warn!(%error, "matching skipped");
        Self {
            rows: Vec::new(),
            message: error.to_string(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Match every feature against every document, document-major.
///
/// `on_progress` receives `(completed / total, message)` after each pair;
/// the final call reports exactly `1.0`.
pub fn match_features(
    features: &[Feature],
    documents: &[ComparisonDocument],
    mut on_progress: Option<&mut dyn FnMut(f64, &str)>,
) -> MatchOutcome {
    if features.is_empty() {
        return MatchOutcome::failed(ChartError::NoFeatures);
    }
    if documents.is_empty() {
        return MatchOutcome::failed(ChartError::NoDocuments);
    }

    let mut seen = HashSet::with_capacity(documents.len());
    for doc in documents {
        if !seen.insert(doc.filename.as_str()) {
            return MatchOutcome::failed(ChartError::DuplicateDocument(doc.filename.clone()));
        }
    }

    let total_features = features.len();
    let total_docs = documents.len();
    let total_steps = total_features * total_docs;
    let mut rows = Vec::with_capacity(total_steps);

    for (doc_index, doc) in documents.iter().enumerate() {
        debug!(document = %doc.filename, chars = doc.content.chars().count(), "matching document");
        for (feature_index, feature) in features.iter().enumerate() {
            rows.push(MatchRow {
                claim_number: feature.claim_number.clone(),
                sequence: feature.sequence,
                feature_text: feature.text.clone(),
                document_filename: doc.filename.clone(),
                related_excerpt: find_relevant(&feature.text, &doc.content, DEFAULT_MAX_LENGTH),
                ..Default::default()
            });

            if let Some(callback) = on_progress.as_mut() {
                let message = format!(
                    "matching feature {}/{}, document {}/{}",
                    feature_index + 1,
                    total_features,
                    doc_index + 1,
                    total_docs
                );
                callback(rows.len() as f64 / total_steps as f64, &message);
            }
        }
    }

    info!(features = total_features, documents = total_docs, rows = rows.len(), "matching complete");
    MatchOutcome {
        rows,
        message: format!("matched {total_features} features against {total_docs} documents"),
        error: None,
    }
}
