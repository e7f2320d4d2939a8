mod common;

use std::time::Duration;

use common::{chat_body, config_for, MockBackend, Reply, TestRouter};
use model_router::load_balancer::FailoverPolicy;

#[tokio::test]
async fn healthy_primary_serves_alone() {
    let primary = MockBackend::start(Reply::ok("primary")).await;
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let router = TestRouter::start(config_for("gpt-4o", &[&primary.url(), &backup.url()])).await;

    let resp = router.chat(chat_body("gpt-4o")).await;
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "primary");

    assert_eq!(primary.count(), 1);
    assert_eq!(backup.count(), 0);
}

#[tokio::test]
async fn server_error_fails_over_to_next_backend() {
    let primary = MockBackend::start(Reply::status(500)).await;
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let router = TestRouter::start(config_for("gpt-4o", &[&primary.url(), &backup.url()])).await;

    let resp = router.chat(chat_body("gpt-4o")).await;
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "backup");

    assert_eq!(primary.count(), 1);
    assert_eq!(backup.count(), 1);

    let pool = router.balancer().pool("gpt-4o").unwrap();
    let first = pool.status(0).unwrap();
    assert!(!first.healthy);
    assert_eq!(first.fail_count, 1);
    assert!(pool.status(1).unwrap().healthy);
}

#[tokio::test]
async fn exhaustion_returns_503_with_last_failure() {
    let a = MockBackend::start(Reply::status(500)).await;
    let b = MockBackend::start(Reply::status(502)).await;
    let router = TestRouter::start(config_for("gpt-4o", &[&a.url(), &b.url()])).await;

    let resp = router.chat(chat_body("gpt-4o")).await;
    assert_eq!(resp.status(), 503);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["code"], "backends_exhausted");
    assert_eq!(json["error"]["type"], "upstream_error");
    assert_eq!(
        json["error"]["message"],
        "all backends failed: backend returned status 502"
    );

    assert_eq!(a.count(), 1);
    assert_eq!(b.count(), 1);
}

#[tokio::test]
async fn attempts_are_bounded_by_max_attempts() {
    let a = MockBackend::start(Reply::status(500)).await;
    let b = MockBackend::start(Reply::status(500)).await;
    let c = MockBackend::start(Reply::ok("c")).await;
    let mut config = config_for("gpt-4o", &[&a.url(), &b.url(), &c.url()]);
    config.retry.max_attempts = 2;
    let router = TestRouter::start(config).await;

    let resp = router.chat(chat_body("gpt-4o")).await;
    assert_eq!(resp.status(), 503);
    assert_eq!(a.count() + b.count(), 2);
    assert_eq!(c.count(), 0);
}

#[tokio::test]
async fn attempts_are_bounded_by_pool_size() {
    let a = MockBackend::start(Reply::status(503)).await;
    let b = MockBackend::start(Reply::status(503)).await;
    let mut config = config_for("gpt-4o", &[&a.url(), &b.url()]);
    config.retry.max_attempts = 10;
    let router = TestRouter::start(config).await;

    let resp = router.chat(chat_body("gpt-4o")).await;
    assert_eq!(resp.status(), 503);
    assert_eq!(a.count(), 1);
    assert_eq!(b.count(), 1);
}

#[tokio::test]
async fn client_errors_from_backend_are_relayed_not_retried() {
    let primary = MockBackend::start(Reply::status(429)).await;
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let router = TestRouter::start(config_for("gpt-4o", &[&primary.url(), &backup.url()])).await;

    let resp = router.chat(chat_body("gpt-4o")).await;
    assert_eq!(resp.status(), 429);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["message"], "mock status 429");

    assert_eq!(backup.count(), 0);
    let status = router.balancer().pool("gpt-4o").unwrap().status(0).unwrap();
    assert!(status.healthy);
}

#[tokio::test]
async fn unreachable_backend_fails_over() {
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let router = TestRouter::start(config_for("gpt-4o", &["http://127.0.0.1:1", &backup.url()])).await;

    let resp = router.chat(chat_body("gpt-4o")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(backup.count(), 1);
    assert!(!router.balancer().pool("gpt-4o").unwrap().status(0).unwrap().healthy);
}

#[tokio::test]
async fn slow_backend_times_out_and_fails_over() {
    let slow = MockBackend::start(Reply::Hang).await;
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let mut config = config_for("gpt-4o", &[&slow.url(), &backup.url()]);
    config.retry.timeout_secs = 1;
    let router = TestRouter::start(config).await;

    let resp = router.chat(chat_body("gpt-4o")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(slow.count(), 1);
    assert_eq!(backup.count(), 1);

    let status = router.balancer().pool("gpt-4o").unwrap().status(0).unwrap();
    assert!(!status.healthy);
    assert_eq!(status.fail_count, 1);
}

#[tokio::test]
async fn success_resets_failure_count() {
    let flaky = MockBackend::scripted(vec![Reply::status(500)], Reply::ok("flaky")).await;
    let router = TestRouter::start(config_for("gpt-4o", &[&flaky.url()])).await;

    assert_eq!(router.chat(chat_body("gpt-4o")).await.status(), 503);
    let pool = router.balancer().pool("gpt-4o").unwrap();
    assert_eq!(pool.status(0).unwrap().fail_count, 1);

    // An unhealthy backend is still tried under full rotation.
    assert_eq!(router.chat(chat_body("gpt-4o")).await.status(), 200);
    let status = pool.status(0).unwrap();
    assert!(status.healthy);
    assert_eq!(status.fail_count, 0);
}

#[tokio::test]
async fn full_rotation_retries_failed_primary_first() {
    let primary = MockBackend::start(Reply::status(500)).await;
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let router = TestRouter::start(config_for("gpt-4o", &[&primary.url(), &backup.url()])).await;

    for _ in 0..3 {
        assert_eq!(router.chat(chat_body("gpt-4o")).await.status(), 200);
    }
    assert_eq!(primary.count(), 3);
    assert_eq!(backup.count(), 3);
}

#[tokio::test]
async fn healthy_first_skips_failed_primary() {
    let primary = MockBackend::start(Reply::status(500)).await;
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let mut config = config_for("gpt-4o", &[&primary.url(), &backup.url()]);
    config.health.failover_policy = FailoverPolicy::HealthyFirst;
    let router = TestRouter::start(config).await;

    for _ in 0..3 {
        assert_eq!(router.chat(chat_body("gpt-4o")).await.status(), 200);
    }
    assert_eq!(primary.count(), 1);
    assert_eq!(backup.count(), 3);
}

#[tokio::test]
async fn recovery_sweep_restores_failed_backend() {
    let primary = MockBackend::start(Reply::status(500)).await;
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let mut config = config_for("gpt-4o", &[&primary.url(), &backup.url()]);
    config.health.sweep_interval_secs = 1;
    config.health.recovery_window_secs = 1;
    let router = TestRouter::start(config).await;

    assert_eq!(router.chat(chat_body("gpt-4o")).await.status(), 200);
    let pool = router.balancer().pool("gpt-4o").unwrap();
    assert!(!pool.status(0).unwrap().healthy);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let status = pool.status(0).unwrap();
    assert!(status.healthy);
    assert_eq!(status.fail_count, 1);
}

#[tokio::test]
async fn stalled_response_body_times_out() {
    let stalled = MockBackend::start(Reply::Stall {
        content_type: "application/json",
        prefix: "{\"partial\"".to_string(),
        content_length: Some(100),
    })
    .await;
    let mut config = config_for("gpt-4o", &[&stalled.url()]);
    config.retry.timeout_secs = 1;
    let router = TestRouter::start(config).await;

    let resp = tokio::time::timeout(Duration::from_secs(5), router.chat(chat_body("gpt-4o")))
        .await
        .expect("router kept waiting on a stalled body");
    assert_eq!(resp.status(), 504);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["code"], "upstream_timeout");

    assert_eq!(stalled.count(), 1);
    let status = router.balancer().pool("gpt-4o").unwrap().status(0).unwrap();
    assert!(!status.healthy);
    assert_eq!(status.fail_count, 1);
}

#[tokio::test]
async fn caller_giving_up_mid_attempt_leaves_health_alone() {
    let slow = MockBackend::start(Reply::Hang).await;
    let backup = MockBackend::start(Reply::ok("backup")).await;
    let mut config = config_for("gpt-4o", &[&slow.url(), &backup.url()]);
    config.retry.timeout_secs = 30;
    let router = TestRouter::start(config).await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let err = impatient
        .post(router.url("/v1/chat/completions"))
        .json(&chat_body("gpt-4o"))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let pool = router.balancer().pool("gpt-4o").unwrap();
    for index in 0..2 {
        let status = pool.status(index).unwrap();
        assert!(status.healthy, "backend {index}");
        assert_eq!(status.fail_count, 0, "backend {index}");
    }
    assert_eq!(slow.count(), 1);
    assert_eq!(backup.count(), 0);
}
