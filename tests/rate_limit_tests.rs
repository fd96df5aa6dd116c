mod common;

use actix_web::http::header;
use actix_web::test;
use docx_template_server::rate_limit::RATE_LIMITED_MESSAGE;
use docx_template_server::{build_app, in_memory_limiter, AppConfig, ErrorResponse};
use serde_json::json;

#[actix_web::test]
async fn test_sixty_first_request_is_rejected_on_any_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("official_letter.docx");
    std::fs::write(&template_path, common::docx(&["{{refNo}}"])).unwrap();

    let mut config = AppConfig::default();
    config.default_template_path = template_path;
    assert_eq!(config.rate_limit.max_requests, 60);
    let app = test::init_service(build_app(&config, in_memory_limiter(&config))).await;

    for i in 0..60 {
        let req = match i % 3 {
            0 => test::TestRequest::post()
                .uri("/api/generate")
                .set_json(json!({"refNo": i})),
            1 => test::TestRequest::post().uri("/api/upload-and-generate"),
            _ => test::TestRequest::post().uri("/api/inspect-template"),
        };
        let resp = test::call_service(&app, req.to_request()).await;
        assert_ne!(resp.status(), 429, "request {} was limited too early", i + 1);
        assert_eq!(
            resp.headers().get("ratelimit-remaining").unwrap(),
            &(59 - i).to_string()
        );
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/inspect-template")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 429);
    assert!(resp.headers().contains_key(header::RETRY_AFTER));
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, RATE_LIMITED_MESSAGE);
}

#[actix_web::test]
async fn test_limiter_is_shared_between_app_instances() {
    let mut config = AppConfig::default();
    config.rate_limit.max_requests = 2;
    let limiter = in_memory_limiter(&config);

    let first = test::init_service(build_app(&config, limiter.clone())).await;
    let second = test::init_service(build_app(&config, limiter)).await;

    let req = || test::TestRequest::post().uri("/api/inspect-template").to_request();
    assert_eq!(test::call_service(&first, req()).await.status(), 400);
    assert_eq!(test::call_service(&second, req()).await.status(), 400);
    assert_eq!(test::call_service(&first, req()).await.status(), 429);
}
