//! Task-tracked analysis: matching (progress 0-50) then LLM judgment (50-100).

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use claimchart_core::{
    AnalysisTask, ChartError, ComparisonDocument, Feature, MatchRow, TaskStore, TaskUpdate,
    match_features,
};

use crate::judge::Judge;

const MATCH_PHASE_END: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    All,
    MatchOnly,
    LlmOnly,
}

impl AnalysisMode {
    pub fn runs_llm(&self) -> bool {
        !matches!(self, Self::MatchOnly)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub features: Vec<Feature>,
    pub documents: Vec<ComparisonDocument>,
    #[serde(default)]
    pub mode: AnalysisMode,
    #[serde(default)]
    pub user_instruction: String,
}

/// Drives analysis requests and records their progress in a [`TaskStore`].
#[derive(Clone)]
pub struct AnalysisRunner {
    store: Arc<dyn TaskStore>,
    judge: Option<Arc<Judge>>,
    judge_concurrency: usize,
}

impl AnalysisRunner {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            judge: None,
            judge_concurrency: 1,
        }
    }

    pub fn with_judge(mut self, judge: Arc<Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Number of judgments in flight at once. Clamped to at least 1.
    pub fn with_judge_concurrency(mut self, concurrency: usize) -> Self {
        self.judge_concurrency = concurrency.max(1);
        self
    }

    pub fn get(&self, id: Uuid) -> Option<AnalysisTask> {
        self.store.get(id)
    }

    /// Create a pending task, run it in the background and return its id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: AnalysisRequest) -> Uuid {
        let id = self.store.create().id;
        let runner = self.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run(id, request).await {
                error!(task_id = %id, error = %e, "analysis task aborted");
            }
        });
        info!(task_id = %id, "analysis task submitted");
        id
    }

    /// Run an already-created task to completion and return its final state.
    pub async fn run(
        &self,
        id: Uuid,
        request: AnalysisRequest,
    ) -> Result<AnalysisTask, ChartError> {
        self.store
            .update(id, TaskUpdate::processing(0, "matching features"))?;

        let store = Arc::clone(&self.store);
        let mut on_progress = |fraction: f64, message: &str| {
            let progress = (fraction * f64::from(MATCH_PHASE_END)).round() as u8;
            if let Err(e) = store.update(id, TaskUpdate::processing(progress, message)) {
                warn!(task_id = %id, error = %e, "progress update rejected");
            }
        };
        let outcome = match_features(&request.features, &request.documents, Some(&mut on_progress));

        if !outcome.is_ok() || outcome.rows.is_empty() {
            warn!(task_id = %id, message = %outcome.message, "analysis failed during matching");
            return self.store.update(id, TaskUpdate::failed(outcome.message));
        }
        let mut rows = outcome.rows;

        let message = match (&self.judge, request.mode.runs_llm()) {
            (_, false) => outcome.message,
            (None, true) => {
                warn!(task_id = %id, "no LLM configured, returning match results only");
                format!("{}; LLM not configured, judgment skipped", outcome.message)
            }
            (Some(judge), true) => {
                self.judge_rows(id, judge, &mut rows, &request).await?;
                format!("analyzed {} rows with {}", rows.len(), judge.model().id)
            }
        };

        info!(task_id = %id, rows = rows.len(), "analysis complete");
        self.store.update(id, TaskUpdate::completed(rows, message))
    }

    async fn judge_rows(
        &self,
        id: Uuid,
        judge: &Arc<Judge>,
        rows: &mut [MatchRow],
        request: &AnalysisRequest,
    ) -> Result<(), ChartError> {
        let contents: HashMap<&str, &str> = request
            .documents
            .iter()
            .map(|doc| (doc.filename.as_str(), doc.content.as_str()))
            .collect();

        let jobs: Vec<_> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let judge = Arc::clone(judge);
                let feature = row.feature_text.clone();
                let compare = contents
                    .get(row.document_filename.as_str())
                    .map_or_else(|| row.related_excerpt.clone(), |c| c.to_string());
                let instruction = request.user_instruction.clone();
                async move {
                    let result = judge.judge(&feature, &compare, &instruction, None).await;
                    (index, result)
                }
            })
            .collect();

        let total = rows.len();
        let mut results = stream::iter(jobs).buffered(self.judge_concurrency);
        let mut done = 0usize;
        while let Some((index, result)) = results.next().await {
            rows[index].apply_judgment(&result);
            done += 1;
            let progress = MATCH_PHASE_END as usize + done * 50 / total;
            self.store.update(
                id,
                TaskUpdate::processing(
                    progress as u8,
                    format!("analyzing feature {done}/{total}"),
                ),
            )?;
        }
        Ok(())
    }
}
