mod support;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use gradewire::gateway::SubmissionGateway;
use gradewire::model::SubmissionStatus;
use gradewire::session::Session;
use gradewire::transport::Transport;

use support::{spawn_judge, JudgeState};

async fn gateway_for(base: &str) -> SubmissionGateway {
    let session = Arc::new(Session::new(None));
    let transport = Transport::new(base.parse().unwrap(), session)
        .unwrap()
        .with_retry_base_delay(Duration::from_millis(5));
    SubmissionGateway::new(Arc::new(transport))
}

fn three_submissions() -> serde_json::Value {
    json!([
        {"id": 1, "status": "Accepted", "score": 100.0, "results": []},
        {"id": 2, "status": "Wrong Answer", "score": 40.0, "results": []},
        {"id": "3", "status": "Pending", "results": []},
    ])
}

// --- History page shapes ---

#[tokio::test]
async fn test_bare_array_and_paged_object_normalize_identically() {
    let judge = JudgeState::new();
    judge.list.push(200, three_submissions());
    judge.list.push(
        200,
        json!({"data": three_submissions(), "pagination": {"page": 1, "total": 3}}),
    );
    let base = spawn_judge(judge).await;
    let gateway = gateway_for(&base).await;

    let bare = gateway.list_submissions("p1", 1, 20).await.unwrap();
    let paged = gateway.list_submissions("p1", 1, 20).await.unwrap();
    assert_eq!(bare.len(), 3);
    assert_eq!(bare, paged);
    assert_eq!(bare[0].id, "1");
    assert_eq!(bare[0].status, SubmissionStatus::Accepted);
    assert_eq!(bare[1].status, SubmissionStatus::Failed);
    assert_eq!(bare[2].id, "3");
}

#[tokio::test]
async fn test_empty_history() {
    let judge = JudgeState::new();
    let base = spawn_judge(judge).await;
    let gateway = gateway_for(&base).await;

    let submissions = gateway.list_submissions("p1", 1, 20).await.unwrap();
    assert!(submissions.is_empty());
}

// --- Snapshot normalization ---

#[tokio::test]
async fn test_get_submission_normalizes_status_and_outcomes() {
    let judge = JudgeState::new();
    judge.fetch.set_default(
        200,
        json!({
            "status": "Wrong Answer",
            "score": 50.0,
            "results": [
                {"test_case_id": 1, "status": "Passed", "execution_time_ms": 12.5},
                {"test_case_id": 2, "status": "Wrong Answer", "error_message": "expected 4, got 5"},
            ]
        }),
    );
    let base = spawn_judge(judge).await;
    let gateway = gateway_for(&base).await;

    let submission = gateway.get_submission("sub-9").await.unwrap();
    // Id comes from the request when the snapshot omits it.
    assert_eq!(submission.id, "sub-9");
    assert_eq!(submission.status, SubmissionStatus::Failed);
    assert_eq!(submission.score, Some(50.0));
    assert_eq!(submission.results.len(), 2);
    assert_eq!(submission.results[0].time_ms, Some(12.5));
    assert!(submission.results[0].is_passed());
    assert!(submission.results[1].has_error_message());
}

#[tokio::test]
async fn test_get_submission_tolerates_missing_fields() {
    let judge = JudgeState::new();
    judge.fetch.set_default(200, json!({"status": "Running"}));
    let base = spawn_judge(judge).await;
    let gateway = gateway_for(&base).await;

    let submission = gateway.get_submission("sub-1").await.unwrap();
    assert_eq!(submission.status, SubmissionStatus::Running);
    assert_eq!(submission.score, None);
    assert!(submission.results.is_empty());
}

// --- Creation responses ---

#[tokio::test]
async fn test_create_accepts_submission_id_or_id_keys() {
    let judge = JudgeState::new();
    judge.create.push(200, json!({"submission_id": "s-77"}));
    judge.create.push(200, json!({"id": 42}));
    judge.create.push(200, json!({"data": {"id": "wrapped-5"}}));
    let base = spawn_judge(judge).await;
    let gateway = gateway_for(&base).await;

    assert_eq!(
        gateway.submit_code("p1", "code", "cpp").await.unwrap(),
        "s-77"
    );
    assert_eq!(gateway.submit_code("p1", "code", "cpp").await.unwrap(), "42");
    assert_eq!(
        gateway.submit_code("p1", "code", "cpp").await.unwrap(),
        "wrapped-5"
    );
}

#[tokio::test]
async fn test_create_without_id_is_a_decode_error() {
    let judge = JudgeState::new();
    judge.run_create.set_default(200, json!({"ok": true}));
    let base = spawn_judge(judge).await;
    let gateway = gateway_for(&base).await;

    let err = gateway.run_code("p1", "code", "cpp").await.unwrap_err();
    assert!(matches!(err, gradewire::error::ClientError::Decode(_)));
}

#[tokio::test]
async fn test_run_and_submit_hit_distinct_endpoints() {
    let judge = JudgeState::new();
    let base = spawn_judge(judge.clone()).await;
    let gateway = gateway_for(&base).await;

    gateway.run_code("p1", "code", "cpp").await.unwrap();
    gateway.submit_code("p1", "code", "cpp").await.unwrap();
    assert_eq!(judge.run_create.hits(), 1);
    assert_eq!(judge.create.hits(), 1);
}
