use serde::{Deserialize, Serialize};

// --- Submission lifecycle status ---

/// Normalized backend submission status. Raw strings are parsed exactly once,
/// at the gateway boundary; everything downstream branches on this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Running,
    Accepted,
    CompileError,
    Failed,
    /// Backend status we do not recognize. Still terminal.
    Other(String),
}

impl SubmissionStatus {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "pending" | "queued" | "in_queue" => SubmissionStatus::Pending,
            "running" | "judging" => SubmissionStatus::Running,
            "accepted" => SubmissionStatus::Accepted,
            _ if lower.contains("compil") => SubmissionStatus::CompileError,
            "wrong answer" | "wrong_answer" | "time limit exceeded" | "runtime error"
            | "memory limit exceeded" | "failed" | "error" => SubmissionStatus::Failed,
            _ => SubmissionStatus::Other(raw.to_string()),
        }
    }

    /// Terminal from the backend's point of view: no further polling needed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending | SubmissionStatus::Running)
    }
}

// --- Per-test result ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// None means a non-scored pseudo-result (e.g. a compile stage row).
    #[serde(default)]
    pub test_case_id: Option<i64>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(
        default,
        alias = "execution_time_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_ms: Option<f64>,
    #[serde(
        default,
        alias = "memory_usage_kb",
        skip_serializing_if = "Option::is_none"
    )]
    pub memory_kb: Option<f64>,
}

impl TestOutcome {
    /// Passed-equivalent labels, compared case-insensitively.
    pub fn is_passed(&self) -> bool {
        matches!(
            self.status.to_lowercase().as_str(),
            "passed" | "accepted" | "ok" | "success"
        )
    }

    pub fn has_error_message(&self) -> bool {
        self.error_message
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty())
    }
}

// --- Submission snapshot ---

/// One graded or test run. Status/score/results are only ever replaced
/// wholesale by a freshly fetched snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: String,
    pub status: SubmissionStatus,
    pub score: Option<f64>,
    pub results: Vec<TestOutcome>,
}

// --- Scoring weights ---

/// Per-test-case point weights, read-only input to the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestWeight {
    pub test_case_id: i64,
    pub points: f64,
}

// --- Aggregated outcome ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Accepted,
    CompileError,
    Error,
    Running,
    Pending,
}

/// Normalized summary derived from a terminal submission snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub status: OverallStatus,
    /// 0–100.
    pub score: u32,
    pub passed: u32,
    pub total: u32,
    pub outcomes: Vec<TestOutcome>,
}
