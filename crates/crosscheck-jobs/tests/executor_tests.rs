//! End-to-end orchestrator tests: the state machine, retry protocol and
//! notification fan-out against mock providers and in-memory stores.

mod common;

use common::*;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crosscheck_core::{ClientId, JobId, WebhookId};
use crosscheck_db::models::JobStatus;
use crosscheck_db::{JobStore, MemoryStores};
use crosscheck_jobs::{JobError, JobRequest};

#[tokio::test]
async fn completes_and_reports_missing_transactions() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    seed_ga4(&stores, client_id, &server).await;
    seed_shopify(&stores, client_id, &server).await;
    seed_user(&stores, client_id, "ops@example.com").await;
    let hook_id = seed_webhook(&stores, client_id, &server).await;

    mount_ga4(
        &server,
        vec![ga4_row("ORD-A", "100"), ga4_row("ORD-B", "200")],
    )
    .await;
    mount_shopify(
        &server,
        vec![
            shopify_order("ORD-A", "100.00"),
            shopify_order("ORD-B", "200.00"),
            shopify_order("ORD-C", "300.00"),
        ],
    )
    .await;

    let mailer = RecordingMailer::new();
    let executor = executor(&stores, mailer.clone());

    let job = executor
        .run_job(ClientId::from(client_id), JobRequest::default())
        .await
        .unwrap();
    // The trigger returns immediately with the freshly created row.
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.max_retries, 3);

    let done = wait_terminal(&stores, job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(done.logs.is_none());

    let summary = done.result_summary.expect("completed job carries a summary");
    assert_eq!(summary["match_rate"], 66.67);
    assert_eq!(summary["missing_count"], 1);
    assert_eq!(summary["missing_ids"], serde_json::json!(["ORD-C"]));
    assert_eq!(summary["total_backend_value"], 600.0);
    assert_eq!(summary["total_ga4_value"], 300.0);
    assert_eq!(summary["ga4_records"], 2);
    assert_eq!(summary["backend_records"], 3);
    assert_eq!(summary["days_analyzed"], 30);
    assert_eq!(summary["retry_attempt"], 1);

    // Both channels fired: job.started + job.completed webhooks, one email.
    let deliveries = stores.deliveries_for(WebhookId::from(hook_id)).await;
    let events: Vec<_> = deliveries.iter().map(|d| d.event.as_str()).collect();
    assert_eq!(events, vec!["job.started", "job.completed"]);
    assert!(deliveries.iter().all(|d| d.success));

    assert_eq!(mailer.recipients(), vec!["ops@example.com".to_string()]);
    let sent = mailer.sent.lock().unwrap();
    assert!(sent[0].subject.contains("66.7"));
    assert!(sent[0].body.contains("Missing transactions: 1"));
}

#[tokio::test]
async fn retries_server_errors_until_the_budget_is_spent() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    seed_ga4(&stores, client_id, &server).await;
    seed_shopify(&stores, client_id, &server).await;
    seed_user(&stores, client_id, "ops@example.com").await;
    let hook_id = seed_webhook(&stores, client_id, &server).await;

    mount_ga4(&server, vec![ga4_row("ORD-A", "100")]).await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2023-10/orders.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mailer = RecordingMailer::new();
    let executor = executor(&stores, mailer.clone());

    let job = executor
        .run_job(ClientId::from(client_id), JobRequest::default())
        .await
        .unwrap();
    let done = wait_terminal(&stores, job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.retry_count, 3);
    assert!(done.completed_at.is_some());
    let logs = done.logs.unwrap();
    assert!(logs.contains("Failed after 3 attempts"), "logs: {logs}");

    // Exactly three backend attempts; GA4 was fetched once and then served
    // from the per-run cache.
    assert_eq!(requests_to(&server, "orders.json").await, 3);
    assert_eq!(requests_to(&server, "runReport").await, 1);

    // job.started fired once, not per retry; job.failed fired at the end.
    let deliveries = stores.deliveries_for(WebhookId::from(hook_id)).await;
    let events: Vec<_> = deliveries.iter().map(|d| d.event.as_str()).collect();
    assert_eq!(events, vec!["job.started", "job.failed"]);

    // Failure email went out.
    assert_eq!(mailer.recipients(), vec!["ops@example.com".to_string()]);
    assert!(mailer.sent.lock().unwrap()[0]
        .subject
        .contains("Reconciliation failed"));
}

#[tokio::test]
async fn client_errors_short_circuit_without_retry() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    seed_ga4(&stores, client_id, &server).await;
    seed_shopify(&stores, client_id, &server).await;

    mount_ga4(&server, vec![ga4_row("ORD-A", "100")]).await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2023-10/orders.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let executor = executor(&stores, RecordingMailer::new());
    let job = executor
        .run_job(ClientId::from(client_id), JobRequest::default())
        .await
        .unwrap();
    let done = wait_terminal(&stores, job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    // One attempt, regardless of max_retries.
    assert_eq!(requests_to(&server, "orders.json").await, 1);
    assert_eq!(done.retry_count, 1);
    assert!(done.logs.unwrap().contains("Failed after 1 attempts"));
}

#[tokio::test]
async fn missing_connectors_fail_immediately_with_notifications() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    // Only the analytics side is configured.
    seed_ga4(&stores, client_id, &server).await;
    let hook_id = seed_webhook(&stores, client_id, &server).await;

    let executor = executor(&stores, RecordingMailer::new());
    let job = executor
        .run_job(ClientId::from(client_id), JobRequest::default())
        .await
        .unwrap();
    let done = wait_terminal(&stores, job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.retry_count, 0);
    let logs = done.logs.unwrap();
    assert!(logs.contains("missing connectors"), "logs: {logs}");
    assert!(logs.contains("backend"));

    // Nothing was fetched.
    assert_eq!(requests_to(&server, "token").await, 0);
    assert_eq!(requests_to(&server, "orders.json").await, 0);

    let deliveries = stores.deliveries_for(WebhookId::from(hook_id)).await;
    let events: Vec<_> = deliveries.iter().map(|d| d.event.as_str()).collect();
    assert_eq!(events, vec!["job.started", "job.failed"]);
}

#[tokio::test]
async fn invalid_date_range_is_terminal_without_any_fetch() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    seed_ga4(&stores, client_id, &server).await;
    seed_shopify(&stores, client_id, &server).await;

    let executor = executor(&stores, RecordingMailer::new());
    let job = executor
        .run_job(
            ClientId::from(client_id),
            JobRequest {
                start_date: Some("2024-02-01".to_string()),
                end_date: Some("2024-01-01".to_string()),
                ..JobRequest::default()
            },
        )
        .await
        .unwrap();
    let done = wait_terminal(&stores, job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.logs.unwrap().contains("start date"));
    assert_eq!(requests_to(&server, "orders.json").await, 0);
}

#[tokio::test]
async fn broken_connector_config_is_terminal() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    seed_ga4(&stores, client_id, &server).await;
    // Backend connector missing its access token.
    seed_connector(
        &stores,
        client_id,
        crosscheck_db::models::ConnectorKind::Shopify,
        &serde_json::json!({ "shop_url": server.uri() }).to_string(),
    )
    .await;

    mount_ga4(&server, vec![ga4_row("ORD-A", "100")]).await;

    let executor = executor(&stores, RecordingMailer::new());
    let job = executor
        .run_job(ClientId::from(client_id), JobRequest::default())
        .await
        .unwrap();
    let done = wait_terminal(&stores, job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.logs.unwrap().contains("access_token is required"));
    // Construction fails before any backend call.
    assert_eq!(requests_to(&server, "orders.json").await, 0);
}

#[tokio::test]
async fn manual_retry_resumes_and_completes() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    seed_ga4(&stores, client_id, &server).await;
    seed_shopify(&stores, client_id, &server).await;
    let hook_id = seed_webhook(&stores, client_id, &server).await;

    mount_ga4(&server, vec![ga4_row("ORD-A", "100")]).await;
    // First backend call 404s; subsequent calls succeed.
    Mock::given(method("GET"))
        .and(path("/admin/api/2023-10/orders.json"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_shopify(&server, vec![shopify_order("ORD-A", "100.00")]).await;

    let executor = executor(&stores, RecordingMailer::new());
    let job = executor
        .run_job(ClientId::from(client_id), JobRequest::default())
        .await
        .unwrap();
    let failed = wait_terminal(&stores, job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.retry_count, 1);

    // Operator retries: resumes at retry_count + 1 with the stored window.
    let resumed = executor.retry_job(JobId::from(job.id)).await.unwrap();
    assert_eq!(resumed.status, JobStatus::Running);
    assert_eq!(resumed.retry_count, 2);

    let done = wait_terminal(&stores, job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(
        done.result_summary.as_ref().unwrap()["retry_attempt"],
        2
    );

    // job.started is not re-emitted for the resumed attempt.
    let deliveries = stores.deliveries_for(WebhookId::from(hook_id)).await;
    let started = deliveries.iter().filter(|d| d.event == "job.started").count();
    assert_eq!(started, 1);

    // A completed job cannot be retried again.
    let err = executor.retry_job(JobId::from(job.id)).await.unwrap_err();
    assert!(matches!(
        err,
        JobError::NotRetryable {
            status: JobStatus::Completed
        }
    ));
}

#[tokio::test]
async fn manual_retry_rejects_exhausted_jobs() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    seed_ga4(&stores, client_id, &server).await;
    seed_shopify(&stores, client_id, &server).await;

    mount_ga4(&server, vec![ga4_row("ORD-A", "100")]).await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2023-10/orders.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let executor = executor(&stores, RecordingMailer::new());
    let job = executor
        .run_job(
            ClientId::from(client_id),
            JobRequest {
                max_retries: Some(1),
                ..JobRequest::default()
            },
        )
        .await
        .unwrap();
    let done = wait_terminal(&stores, job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.retry_count, 1);

    let err = executor.retry_job(JobId::from(job.id)).await.unwrap_err();
    assert!(matches!(err, JobError::RetriesExhausted { .. }));
}

#[tokio::test]
async fn retry_of_unknown_job_is_rejected() {
    let stores = MemoryStores::new();
    let executor = executor(&stores, RecordingMailer::new());
    let err = executor.retry_job(JobId::new()).await.unwrap_err();
    assert!(matches!(err, JobError::NotFound(_)));
}

#[tokio::test]
async fn max_retries_is_clamped_into_the_allowed_band() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();

    seed_ga4(&stores, client_id, &server).await;
    seed_shopify(&stores, client_id, &server).await;
    mount_ga4(&server, vec![]).await;
    mount_shopify(&server, vec![]).await;

    let executor = executor(&stores, RecordingMailer::new());
    let job = executor
        .run_job(
            ClientId::from(client_id),
            JobRequest {
                max_retries: Some(99),
                ..JobRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(job.max_retries, 5);

    // Empty datasets still complete (zero-division guard in the matcher).
    let done = wait_terminal(&stores, job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.result_summary.unwrap()["match_rate"], 0.0);
}

#[tokio::test]
async fn test_webhook_entry_point_uses_a_synthetic_job() {
    let server = MockServer::start().await;
    let stores = MemoryStores::new();
    let client_id = Uuid::new_v4();
    let hook_id = seed_webhook(&stores, client_id, &server).await;

    let executor = executor(&stores, RecordingMailer::new());
    let synthetic = crosscheck_db::models::NewJob::for_client(client_id).into_job();

    let ok = executor
        .send_test_webhook(WebhookId::from(hook_id), &synthetic)
        .await
        .unwrap();
    assert!(ok);

    // The synthetic job never touched the job store.
    assert!(stores
        .get(JobId::from(synthetic.id))
        .await
        .unwrap()
        .is_none());
    assert_eq!(stores.deliveries_for(WebhookId::from(hook_id)).await.len(), 1);
}
