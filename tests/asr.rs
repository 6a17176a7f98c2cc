//! Speech-recognition backend tests against mock HTTP services
//!
//! Exercises both protocols without real provider accounts: token
//! caching and error-code mapping for the synchronous backend, and the
//! upload/create/poll flow for the polling backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use talkback::asr::{AsrError, AudioUploader, BaiduAsr, IflyAsr, TranscriptionBackend};
use talkback::config::{BaiduConfig, IflyConfig};
use talkback::AudioClip;

mod common;
use common::{spawn_service, speech_clip, stereo_clip};

fn baidu_config(base: &str) -> BaiduConfig {
    BaiduConfig {
        api_key: "client-id".to_string(),
        secret_key: "client-secret".to_string(),
        token_url: format!("{base}/token"),
        asr_url: format!("{base}/asr"),
        ..BaiduConfig::default()
    }
}

fn ifly_config(base: &str, poll_interval_ms: u64) -> IflyConfig {
    IflyConfig {
        app_id: "app".to_string(),
        api_key: "key".to_string(),
        api_secret: "secret".to_string(),
        host: "127.0.0.1".to_string(),
        create_url: format!("{base}/v2/ost/pro_create"),
        query_url: format!("{base}/v2/ost/query"),
        poll_interval: Duration::from_millis(poll_interval_ms),
        ..IflyConfig::default()
    }
}

/// Upload collaborator that hands back a fixed URL
struct StaticUploader;

#[async_trait]
impl AudioUploader for StaticUploader {
    async fn upload(&self, _clip: &AudioClip) -> Result<String, AsrError> {
        Ok("https://files.example/clip.wav".to_string())
    }
}

#[tokio::test]
async fn baidu_caches_the_access_token() {
    let token_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&token_hits);

    let router = Router::new()
        .route(
            "/token",
            post(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"access_token": "tok-1", "expires_in": 2_592_000}))
                }
            }),
        )
        .route(
            "/asr",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["token"], "tok-1");
                assert_eq!(body["channel"], 1);
                assert_eq!(body["format"], "wav");
                assert_eq!(body["rate"], 16000);
                Json(json!({"err_no": 0, "err_msg": "success", "result": ["你好", "世界"]}))
            }),
        );

    let base = spawn_service(router).await;
    let mut backend = BaiduAsr::new(baidu_config(&base)).unwrap();
    let clip = speech_clip(16000, 1.0);

    // Candidates are concatenated into one transcript
    assert_eq!(backend.transcribe(&clip).await.unwrap(), "你好世界");
    assert_eq!(backend.transcribe(&clip).await.unwrap(), "你好世界");

    // Second transcription reused the cached token
    assert_eq!(token_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn baidu_normalizes_nonstandard_rates_on_the_wire() {
    let router = Router::new()
        .route(
            "/token",
            post(|| async { Json(json!({"access_token": "tok", "expires_in": 2_592_000})) }),
        )
        .route(
            "/asr",
            post(|Json(body): Json<Value>| async move {
                // 22050 Hz capture goes out as the nearest standard rate
                assert_eq!(body["rate"], 16000);
                Json(json!({"err_no": 0, "result": ["ok"]}))
            }),
        );

    let base = spawn_service(router).await;
    let mut backend = BaiduAsr::new(baidu_config(&base)).unwrap();
    let clip = speech_clip(22050, 1.0);

    assert_eq!(backend.transcribe(&clip).await.unwrap(), "ok");
}

#[tokio::test]
async fn baidu_maps_service_error_codes() {
    for (err_no, check) in [
        (3311_i64, "sample rate"),
        (3300, "parameters"),
        (3301, "quality"),
    ] {
        let router = Router::new()
            .route(
                "/token",
                post(|| async { Json(json!({"access_token": "tok", "expires_in": 2_592_000})) }),
            )
            .route(
                "/asr",
                post(move || async move { Json(json!({"err_no": err_no, "err_msg": "err"})) }),
            );

        let base = spawn_service(router).await;
        let mut backend = BaiduAsr::new(baidu_config(&base)).unwrap();

        let err = backend
            .transcribe(&speech_clip(16000, 1.0))
            .await
            .unwrap_err();
        assert!(
            err.user_message().to_lowercase().contains(check),
            "err_no {err_no} produced {:?}",
            err.user_message()
        );
    }
}

#[tokio::test]
async fn baidu_unknown_codes_carry_the_server_text() {
    let router = Router::new()
        .route(
            "/token",
            post(|| async { Json(json!({"access_token": "tok", "expires_in": 2_592_000})) }),
        )
        .route(
            "/asr",
            post(|| async { Json(json!({"err_no": 3302, "err_msg": "authentication failed"})) }),
        );

    let base = spawn_service(router).await;
    let mut backend = BaiduAsr::new(baidu_config(&base)).unwrap();

    let err = backend
        .transcribe(&speech_clip(16000, 1.0))
        .await
        .unwrap_err();
    match &err {
        AsrError::Upstream { code, message } => {
            assert_eq!(*code, 3302);
            assert_eq!(message, "authentication failed");
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
    assert!(err.user_message().contains("authentication failed"));
}

#[tokio::test]
async fn baidu_empty_result_list_is_a_distinct_failure() {
    let router = Router::new()
        .route(
            "/token",
            post(|| async { Json(json!({"access_token": "tok", "expires_in": 2_592_000})) }),
        )
        .route(
            "/asr",
            post(|| async { Json(json!({"err_no": 0, "result": []})) }),
        );

    let base = spawn_service(router).await;
    let mut backend = BaiduAsr::new(baidu_config(&base)).unwrap();

    let err = backend
        .transcribe(&speech_clip(16000, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AsrError::EmptyResult));
}

#[tokio::test]
async fn baidu_missing_token_field_is_a_credential_failure() {
    let router = Router::new().route(
        "/token",
        post(|| async { Json(json!({"error": "invalid_client"})) }),
    );

    let base = spawn_service(router).await;
    let mut backend = BaiduAsr::new(baidu_config(&base)).unwrap();

    let err = backend
        .transcribe(&speech_clip(16000, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AsrError::Credential));
}

#[tokio::test]
async fn gate_runs_before_any_network_call() {
    let token_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&token_hits);

    let router = Router::new().route(
        "/token",
        post(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({"access_token": "tok", "expires_in": 2_592_000}))
            }
        }),
    );

    let base = spawn_service(router).await;
    let mut backend = BaiduAsr::new(baidu_config(&base)).unwrap();

    let err = backend
        .transcribe(&stereo_clip(16000, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AsrError::Rejected(_)));
    assert_eq!(token_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ifly_polls_until_the_task_completes() {
    let query_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&query_hits);

    let router = Router::new()
        .route(
            "/v2/ost/pro_create",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["common"]["app_id"], "app");
                assert_eq!(body["data"]["audio_url"], "https://files.example/clip.wav");
                Json(json!({"data": {"task_id": "task-1"}}))
            }),
        )
        .route(
            "/v2/ost/query",
            post(move |Json(body): Json<Value>| {
                let hits = Arc::clone(&hits);
                async move {
                    assert_eq!(body["business"]["task_id"], "task-1");
                    let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 4 {
                        Json(json!({"data": {"task_status": "2"}}))
                    } else {
                        Json(json!({"data": {"task_status": "4", "result": {"onebest": "你好"}}}))
                    }
                }
            }),
        );

    let base = spawn_service(router).await;
    let mut backend = IflyAsr::new(ifly_config(&base, 10), Box::new(StaticUploader)).unwrap();

    let text = backend.transcribe(&speech_clip(16000, 1.0)).await.unwrap();
    assert_eq!(text, "你好");
    assert_eq!(query_hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn ifly_poll_budget_exhaustion_times_out() {
    let query_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&query_hits);

    let router = Router::new()
        .route(
            "/v2/ost/pro_create",
            post(|| async { Json(json!({"data": {"task_id": "task-1"}})) }),
        )
        .route(
            "/v2/ost/query",
            post(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"data": {"task_status": "2"}}))
                }
            }),
        );

    let base = spawn_service(router).await;
    let mut backend = IflyAsr::new(ifly_config(&base, 1), Box::new(StaticUploader)).unwrap();

    let err = backend
        .transcribe(&speech_clip(16000, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AsrError::PollTimeout));
    assert_eq!(query_hits.load(Ordering::SeqCst), 30);
}

#[tokio::test]
async fn ifly_reports_a_failed_task() {
    let router = Router::new()
        .route(
            "/v2/ost/pro_create",
            post(|| async { Json(json!({"data": {"task_id": "task-1"}})) }),
        )
        .route(
            "/v2/ost/query",
            post(|| async { Json(json!({"data": {"task_status": "5", "result": "engine error"}})) }),
        );

    let base = spawn_service(router).await;
    let mut backend = IflyAsr::new(ifly_config(&base, 1), Box::new(StaticUploader)).unwrap();

    let err = backend
        .transcribe(&speech_clip(16000, 1.0))
        .await
        .unwrap_err();
    match err {
        AsrError::TaskFailed(reason) => assert_eq!(reason, "engine error"),
        other => panic!("expected TaskFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn ifly_missing_task_id_fails_fast() {
    let query_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&query_hits);

    let router = Router::new()
        .route(
            "/v2/ost/pro_create",
            post(|| async { Json(json!({"data": {}})) }),
        )
        .route(
            "/v2/ost/query",
            post(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"data": {"task_status": "2"}}))
                }
            }),
        );

    let base = spawn_service(router).await;
    let mut backend = IflyAsr::new(ifly_config(&base, 1), Box::new(StaticUploader)).unwrap();

    let err = backend
        .transcribe(&speech_clip(16000, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AsrError::TaskCreate));
    // never got as far as polling
    assert_eq!(query_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ifly_rejects_nonstandard_rates_without_uploading() {
    /// Uploader that fails the test if it is ever reached
    struct PanickingUploader;

    #[async_trait]
    impl AudioUploader for PanickingUploader {
        async fn upload(&self, _clip: &AudioClip) -> Result<String, AsrError> {
            panic!("gate should have rejected the clip before upload");
        }
    }

    let mut backend =
        IflyAsr::new(ifly_config("http://127.0.0.1:9", 1), Box::new(PanickingUploader)).unwrap();

    let err = backend
        .transcribe(&speech_clip(22050, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AsrError::Rejected(_)));
}
