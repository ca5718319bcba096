use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::model::{Submission, SubmissionStatus, TestOutcome};
use crate::transport::{RequestOptions, Transport};

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct RawSubmission {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    results: Vec<TestOutcome>,
}

/// The history endpoint answers in one of two shapes: a bare array, or an
/// object wrapping the array with pagination metadata. Resolved to a plain
/// list here so nothing downstream ever sees the difference.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmissionPage {
    Bare(Vec<RawSubmission>),
    Paged {
        data: Vec<RawSubmission>,
        #[serde(default)]
        #[allow(dead_code)]
        pagination: serde_json::Value,
    },
}

impl SubmissionPage {
    fn into_items(self) -> Vec<RawSubmission> {
        match self {
            SubmissionPage::Bare(items) => items,
            SubmissionPage::Paged { data, .. } => data,
        }
    }
}

// --- Gateway ---

/// Thin typed façade over the transport: one method per backend operation.
/// Raw status strings are normalized to [`SubmissionStatus`] here and only
/// here.
pub struct SubmissionGateway {
    transport: Arc<Transport>,
}

impl SubmissionGateway {
    pub fn new(transport: Arc<Transport>) -> Self {
        SubmissionGateway { transport }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Create an ephemeral run, not recorded in history.
    pub async fn run_code(
        &self,
        problem_id: &str,
        source_code: &str,
        language: &str,
    ) -> ClientResult<String> {
        let response = self
            .transport
            .request(
                "submissions/run",
                RequestOptions::post(json!({
                    "problem_id": problem_id,
                    "source_code": source_code,
                    "language": language,
                })),
            )
            .await?;
        extract_submission_id(&response.data)
    }

    /// Create a graded submission, recorded in history.
    pub async fn submit_code(
        &self,
        problem_id: &str,
        source_code: &str,
        language: &str,
    ) -> ClientResult<String> {
        let response = self
            .transport
            .request(
                "submissions",
                RequestOptions::post(json!({
                    "problem_id": problem_id,
                    "source_code": source_code,
                    "language": language,
                })),
            )
            .await?;
        extract_submission_id(&response.data)
    }

    /// Fetch the current snapshot of a submission.
    pub async fn get_submission(&self, submission_id: &str) -> ClientResult<Submission> {
        let response = self
            .transport
            .request(
                &format!("submissions/{submission_id}"),
                RequestOptions::get(),
            )
            .await?;
        let raw: RawSubmission = serde_json::from_value(response.data)
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(normalize(submission_id, raw))
    }

    /// Fetch submission history for a problem, normalized to a plain list.
    pub async fn list_submissions(
        &self,
        problem_id: &str,
        page: u32,
        page_size: u32,
    ) -> ClientResult<Vec<Submission>> {
        let response = self
            .transport
            .request(
                &format!("problems/{problem_id}/submissions?page={page}&page_size={page_size}"),
                RequestOptions::get(),
            )
            .await?;
        let parsed: SubmissionPage = serde_json::from_value(response.data)
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        let items = parsed.into_items();
        debug!("Fetched {} submissions for problem {}", items.len(), problem_id);
        Ok(items.into_iter().map(|raw| normalize("", raw)).collect())
    }
}

/// Creation responses carry the new id under `submission_id` or `id`,
/// as a number or a string.
fn extract_submission_id(data: &serde_json::Value) -> ClientResult<String> {
    data.get("submission_id")
        .or_else(|| data.get("id"))
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| ClientError::Decode("No submission id in creation response".to_string()))
}

fn normalize(fallback_id: &str, raw: RawSubmission) -> Submission {
    let id = raw
        .id
        .as_ref()
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| fallback_id.to_string());
    let status = raw
        .status
        .as_deref()
        .map(SubmissionStatus::parse)
        .unwrap_or(SubmissionStatus::Pending);
    Submission {
        id,
        status,
        score: raw.score,
        results: raw.results,
    }
}
