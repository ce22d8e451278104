//! End-to-end scenarios for the audit pipeline.
//!
//! Both collaborators are mocked: a mockito server plays the crawled website,
//! a second one plays the model endpoint. The engine runs the real pipeline
//! (crawl -> extract -> checks -> twelve modules -> reduce -> report) against
//! an in-memory store.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;

use barrierefrei_core::config::Config;
use barrierefrei_core::domain::models::{JobStatus, ModuleStatus, PlanTier, SubmitRequest};
use barrierefrei_core::repository::{ReportRepository, ResultRepository};
use barrierefrei_core::service::AuditEngine;

async fn setup_test_db() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Engine wired against a mock model endpoint.
async fn engine_for(llm_server: &ServerGuard) -> (Arc<AuditEngine>, SqlitePool) {
    let pool = setup_test_db().await;
    let config = Config::for_tests(llm_server.url(), "sqlite::memory:".into());
    let engine = AuditEngine::new(pool.clone(), config).expect("engine builds");
    (Arc::new(engine), pool)
}

fn module_result_json(score: i64) -> String {
    json!({
        "summary": {
            "score": score,
            "compliance_level": if score >= 80 { "AA" } else { "PARTIAL" },
            "overall_assessment": "End-to-end assessment."
        },
        "criteria_evaluation": [{
            "criterion_id": "1.1.1",
            "name": "Non-text Content",
            "status": if score >= 65 { "PASSED" } else { "FAILED" },
            "finding": "observed",
            "impact": "limited",
            "recommendation": "keep it up",
            "examples": [],
            "severity": "minor"
        }],
        "priority_actions": {
            "immediate": [{"title": "Tune alt texts", "description": "d"}],
            "short_term": [],
            "long_term": []
        }
    })
    .to_string()
}

fn gemini_response(text: &str) -> String {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }],
        "usageMetadata": { "promptTokenCount": 100, "candidatesTokenCount": 50 }
    })
    .to_string()
}

const LLM_PATH: &str = "/v1beta/models/test-model:generateContent?key=test-key";

/// Mock for the site root plus the given internal pages. The returned mock
/// handles must stay alive for the duration of the test.
async fn mock_site(server: &mut ServerGuard, linked_pages: &[&str]) -> Vec<mockito::Mock> {
    let links: String = linked_pages
        .iter()
        .map(|p| format!(r#"<a href="{}">{}</a>"#, p, p))
        .collect();
    let body = format!(
        r#"<html lang="en"><head><title>Root</title></head>
        <body><main><h1>Welcome</h1>{}<img src="/logo.png" alt="Logo"></main></body></html>"#,
        links
    );

    let mut mocks = vec![
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await,
    ];

    for page in linked_pages {
        mocks.push(
            server
                .mock("GET", *page)
                .with_status(200)
                .with_body(format!(
                    r#"<html lang="en"><head><title>{0}</title></head>
                    <body><main><h1>{0}</h1></main></body></html>"#,
                    page
                ))
                .create_async()
                .await,
        );
    }

    mocks
}

#[tokio::test]
async fn happy_path_produces_a_completed_job_and_report() {
    let mut site = Server::new_async().await;
    let _site_mocks = mock_site(&mut site, &["/about", "/contact"]).await;

    let mut llm = Server::new_async().await;
    llm.mock("POST", LLM_PATH)
        .with_status(200)
        .with_body(gemini_response(&module_result_json(85)))
        .create_async()
        .await;

    let (engine, pool) = engine_for(&llm).await;
    let job_id = engine
        .submit(SubmitRequest {
            url: site.url(),
            plan: PlanTier::Pro,
            max_pages: Some(3),
            submitter_id: Some("user-7".into()),
        })
        .await
        .unwrap();

    engine.wait_for(&job_id).await;

    let status = engine.poll(&job_id).await.unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.progress, 100);
    assert!(status.report_available);
    assert!(status.error.is_none());
    assert!(status.completed_at.is_some());

    // Twelve module rows, all completed (P4).
    let records = ResultRepository::new(pool.clone()).list(&job_id).await.unwrap();
    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|r| r.status == ModuleStatus::Completed));
    assert!(records.iter().all(|r| r.token_usage == 150));

    // One report row with the aggregate level (mean 85 => AA).
    let report = engine.get_report(&job_id).await.unwrap();
    assert_eq!(report.conformance_level.as_str(), "AA");
    assert_eq!(report.expert_analyses.len(), 12);
    assert_eq!(report.technical_analysis["modules_completed"], 12);
    assert_eq!(report.technical_analysis["crawl"]["pages_analyzed"], 3);
    assert!(report.executive_summary.contains("Tune alt texts"));
}

#[tokio::test]
async fn single_permanent_module_failure_still_completes_the_job() {
    let mut site = Server::new_async().await;
    let _site_mocks = mock_site(&mut site, &[]).await;

    let mut llm = Server::new_async().await;
    // Generic success first; the axis-specific 4xx is registered later so it
    // matches first for the 2.3 module.
    llm.mock("POST", LLM_PATH)
        .with_status(200)
        .with_body(gemini_response(&module_result_json(88)))
        .create_async()
        .await;
    llm.mock("POST", LLM_PATH)
        .match_body(Matcher::Regex("success criterion group 2\\.3".into()))
        .with_status(400)
        .with_body("unsupported request")
        .create_async()
        .await;

    let (engine, pool) = engine_for(&llm).await;
    let job_id = engine
        .submit(SubmitRequest {
            url: site.url(),
            plan: PlanTier::Basic,
            max_pages: Some(1),
            submitter_id: None,
        })
        .await
        .unwrap();

    engine.wait_for(&job_id).await;

    assert_eq!(engine.poll(&job_id).await.unwrap().status, JobStatus::Completed);

    let records = ResultRepository::new(pool.clone()).list(&job_id).await.unwrap();
    assert_eq!(records.len(), 12);
    let failed: Vec<_> = records
        .iter()
        .filter(|r| r.status == ModuleStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].axis.as_str(), "2.3");
    assert!(failed[0].error.as_deref().unwrap().contains("LLMPermanent"));

    // The failed axis is absent from the report; the mean covers eleven.
    let report = engine.get_report(&job_id).await.unwrap();
    assert_eq!(report.expert_analyses.len(), 11);
    assert!(report.expert_analyses.get("2.3").is_none());
    assert_eq!(report.technical_analysis["modules_completed"], 11);
    assert_eq!(report.technical_analysis["overall_score"], 88.0);
}

#[tokio::test]
async fn too_many_module_failures_fail_the_job_without_a_report() {
    let mut site = Server::new_async().await;
    let _site_mocks = mock_site(&mut site, &[]).await;

    let mut llm = Server::new_async().await;
    // Default: permanent rejection. Five named axes succeed (five < six).
    llm.mock("POST", LLM_PATH)
        .with_status(400)
        .with_body("rejected")
        .create_async()
        .await;
    for axis in ["1\\.1", "1\\.2", "1\\.3", "1\\.4", "2\\.1"] {
        llm.mock("POST", LLM_PATH)
            .match_body(Matcher::Regex(format!("success criterion group {}", axis)))
            .with_status(200)
            .with_body(gemini_response(&module_result_json(70)))
            .create_async()
            .await;
    }

    let (engine, pool) = engine_for(&llm).await;
    let job_id = engine
        .submit(SubmitRequest {
            url: site.url(),
            plan: PlanTier::Basic,
            max_pages: Some(1),
            submitter_id: None,
        })
        .await
        .unwrap();

    engine.wait_for(&job_id).await;

    let status = engine.poll(&job_id).await.unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert!(status
        .error
        .as_deref()
        .unwrap()
        .contains("InsufficientCoverage"));
    assert!(!status.report_available);

    let records = ResultRepository::new(pool.clone()).list(&job_id).await.unwrap();
    assert_eq!(
        records
            .iter()
            .filter(|r| r.status == ModuleStatus::Completed)
            .count(),
        5
    );
    assert!(ReportRepository::new(pool).get(&job_id).await.unwrap().is_none());
}

#[tokio::test]
async fn fenced_output_with_trailing_commas_repairs_without_retry() {
    let mut site = Server::new_async().await;
    let _site_mocks = mock_site(&mut site, &[]).await;

    // serde_json renders compact JSON; appending the comma after the last
    // bucket produces a genuine trailing comma before the closing braces.
    let fenced = format!(
        "```json\n{}\n```",
        module_result_json(92).replace("\"short_term\":[]", "\"short_term\":[],")
    );

    let mut llm = Server::new_async().await;
    let llm_mock = llm
        .mock("POST", LLM_PATH)
        .with_status(200)
        .with_body(gemini_response(&fenced))
        .expect(12)
        .create_async()
        .await;

    let (engine, pool) = engine_for(&llm).await;
    let job_id = engine
        .submit(SubmitRequest {
            url: site.url(),
            plan: PlanTier::Basic,
            max_pages: Some(1),
            submitter_id: None,
        })
        .await
        .unwrap();

    engine.wait_for(&job_id).await;

    assert_eq!(engine.poll(&job_id).await.unwrap().status, JobStatus::Completed);

    let records = ResultRepository::new(pool).list(&job_id).await.unwrap();
    assert!(records.iter().all(|r| r.status == ModuleStatus::Completed));
    // Raw text is retained verbatim, fences included.
    assert!(records[0].raw_output.as_deref().unwrap().starts_with("```json"));

    // Exactly one call per module: repair consumed no retry.
    llm_mock.assert_async().await;
}

#[tokio::test]
async fn cancellation_mid_flight_leaves_no_report() {
    let mut site = Server::new_async().await;
    let _site_mocks = mock_site(&mut site, &["/a", "/b", "/c"]).await;

    let mut llm = Server::new_async().await;
    llm.mock("POST", LLM_PATH)
        .with_status(200)
        .with_body(gemini_response(&module_result_json(85)))
        .create_async()
        .await;

    let (engine, pool) = engine_for(&llm).await;
    let job_id = engine
        .submit(SubmitRequest {
            url: site.url(),
            plan: PlanTier::Pro,
            max_pages: Some(4),
            submitter_id: None,
        })
        .await
        .unwrap();

    engine.cancel(&job_id).await.unwrap();
    engine.wait_for(&job_id).await;

    let status = engine.poll(&job_id).await.unwrap();
    assert_eq!(status.status, JobStatus::Cancelled);
    assert!(status.progress < 100);
    assert!(!status.report_available);
    assert!(ReportRepository::new(pool).get(&job_id).await.unwrap().is_none());

    // Cancelling a terminal job is rejected.
    assert_eq!(
        engine.cancel(&job_id).await.unwrap_err().code(),
        "IllegalState"
    );
}

#[tokio::test]
async fn unreachable_root_fails_the_job_with_crawl_fatal() {
    let llm = Server::new_async().await;

    let (engine, pool) = engine_for(&llm).await;
    let job_id = engine
        .submit(SubmitRequest {
            url: "https://does-not-exist.invalid/".into(),
            plan: PlanTier::Basic,
            max_pages: None,
            submitter_id: None,
        })
        .await
        .unwrap();

    engine.wait_for(&job_id).await;

    let status = engine.poll(&job_id).await.unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert!(status.error.as_deref().unwrap().contains("CrawlFatal"));

    // No module rows, no report (the pipeline never reached dispatch).
    let records = ResultRepository::new(pool.clone()).list(&job_id).await.unwrap();
    assert!(records.is_empty());
    assert!(ReportRepository::new(pool).get(&job_id).await.unwrap().is_none());
}

#[tokio::test]
async fn submitting_the_same_url_twice_runs_two_independent_jobs() {
    let mut site = Server::new_async().await;
    let _site_mocks = mock_site(&mut site, &[]).await;

    let mut llm = Server::new_async().await;
    llm.mock("POST", LLM_PATH)
        .with_status(200)
        .with_body(gemini_response(&module_result_json(85)))
        .create_async()
        .await;

    let (engine, _pool) = engine_for(&llm).await;
    let request = SubmitRequest {
        url: site.url(),
        plan: PlanTier::Basic,
        max_pages: Some(1),
        submitter_id: None,
    };

    let first = engine.submit(request.clone()).await.unwrap();
    let second = engine.submit(request).await.unwrap();
    assert_ne!(first, second);

    engine.wait_for(&first).await;
    engine.wait_for(&second).await;

    assert_eq!(engine.poll(&first).await.unwrap().status, JobStatus::Completed);
    assert_eq!(engine.poll(&second).await.unwrap().status, JobStatus::Completed);
    assert!(engine.get_report(&first).await.is_ok());
    assert!(engine.get_report(&second).await.is_ok());
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let llm = Server::new_async().await;
    let (engine, _pool) = engine_for(&llm).await;

    let err = engine
        .submit(SubmitRequest {
            url: "not a url".into(),
            plan: PlanTier::Basic,
            max_pages: None,
            submitter_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidUrl");

    let err = engine
        .submit(SubmitRequest {
            url: "ftp://example.com/".into(),
            plan: PlanTier::Basic,
            max_pages: None,
            submitter_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidUrl");

    assert_eq!(engine.poll("missing").await.unwrap_err().code(), "NotFound");
    assert_eq!(engine.cancel("missing").await.unwrap_err().code(), "NotFound");
}
