use actix_web::http::header;
use actix_web::test;
use docx_template_server::{build_app, in_memory_limiter, AppConfig};

#[actix_web::test]
async fn test_security_headers_on_every_response() {
    let config = AppConfig::default();
    let app = test::init_service(build_app(&config, in_memory_limiter(&config))).await;

    for req in [
        test::TestRequest::post().uri("/api/inspect-template"),
        test::TestRequest::get().uri("/"),
    ] {
        let resp = test::call_service(&app, req.to_request()).await;
        let headers = resp.headers();
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "SAMEORIGIN");
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
        assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    }
}

#[actix_web::test]
async fn test_demo_page_is_served_at_root() {
    let config = AppConfig::default();
    let app = test::init_service(build_app(&config, in_memory_limiter(&config))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), 200);
    let body = test::read_body(resp).await;
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains("Docx Template Server"));
    assert!(html.contains("/app.js"));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/app.js").to_request()).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_openapi_document_lists_routes() {
    let config = AppConfig::default();
    let app = test::init_service(build_app(&config, in_memory_limiter(&config))).await;

    let req = test::TestRequest::get().uri("/api-doc/openapi.json").to_request();
    let doc: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    let paths = doc["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/generate"));
    assert!(paths.contains_key("/api/upload-and-generate"));
    assert!(paths.contains_key("/api/inspect-template"));
}

#[actix_web::test]
async fn test_cors_exposes_content_disposition() {
    let config = AppConfig::default();
    let app = test::init_service(build_app(&config, in_memory_limiter(&config))).await;

    let req = test::TestRequest::post()
        .uri("/api/inspect-template")
        .insert_header((header::ORIGIN, "https://letters.example"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let exposed = resp
        .headers()
        .get(header::ACCESS_CONTROL_EXPOSE_HEADERS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("content-disposition"));
}
