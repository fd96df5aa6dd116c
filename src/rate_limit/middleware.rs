use std::sync::Arc;

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};
use log::warn;

use super::store::{RateLimitStore, WindowState};
use crate::error::ErrorResponse;

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

const LIMIT_HEADER: HeaderName = HeaderName::from_static("ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Admission control shared by every worker.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, max_requests: u32) -> Self {
        Self { store, max_requests }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Record a hit for `key`. `None` means the store failed and the request is let through.
    pub async fn check(&self, key: &str) -> Option<WindowState> {
        match self.store.hit(key).await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Rate limit store unavailable, allowing request from {}: {}", key, e);
                None
            }
        }
    }
}

fn client_key(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn reset_secs(state: &WindowState) -> u64 {
    // Rounded up to whole seconds.
    let secs = state.resets_in.as_secs();
    if state.resets_in.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn apply_headers(headers: &mut header::HeaderMap, limit: u32, state: &WindowState) {
    let remaining = limit.saturating_sub(state.hits);
    headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(reset_secs(state)));
}

/// `from_fn` middleware enforcing the fixed window held by [`RateLimiter`].
pub async fn enforce_rate_limit(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let Some(limiter) = req.app_data::<web::Data<RateLimiter>>().cloned() else {
        return Ok(next.call(req).await?.map_into_boxed_body());
    };

    let key = client_key(&req);
    let Some(state) = limiter.check(&key).await else {
        return Ok(next.call(req).await?.map_into_boxed_body());
    };

    if state.hits > limiter.max_requests() {
        warn!("Rate limit exceeded for {} ({} requests)", key, state.hits);
        let mut response = HttpResponse::TooManyRequests()
            .insert_header((header::RETRY_AFTER, reset_secs(&state)))
            .json(ErrorResponse::new(RATE_LIMITED_MESSAGE));
        apply_headers(response.headers_mut(), limiter.max_requests(), &state);
        return Ok(req.into_response(response));
    }

    let mut response = next.call(req).await?.map_into_boxed_body();
    apply_headers(response.headers_mut(), limiter.max_requests(), &state);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::InMemoryRateLimitStore;
    use actix_web::middleware::from_fn;
    use actix_web::{test, App};
    use async_trait::async_trait;
    use std::time::Duration;

    struct BrokenStore;

    #[async_trait]
    impl RateLimitStore for BrokenStore {
        async fn hit(&self, _key: &str) -> Result<WindowState, String> {
            Err("connection refused".to_string())
        }
    }

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::new(Arc::new(InMemoryRateLimitStore::new(Duration::from_secs(60))), max)
    }

    #[actix_web::test]
    async fn test_requests_over_limit_are_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(limiter(2)))
                .wrap(from_fn(enforce_rate_limit))
                .route("/", web::get().to(ok)),
        )
        .await;

        for expected_remaining in ["1", "0"] {
            let req = test::TestRequest::get().uri("/").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200);
            assert_eq!(resp.headers().get("ratelimit-limit").unwrap(), "2");
            assert_eq!(resp.headers().get("ratelimit-remaining").unwrap(), expected_remaining);
        }

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), 429);
        assert!(resp.headers().contains_key(header::RETRY_AFTER));
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, RATE_LIMITED_MESSAGE);
    }

    #[actix_web::test]
    async fn test_clients_are_limited_independently() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(limiter(1)))
                .wrap(from_fn(enforce_rate_limit))
                .route("/", web::get().to(ok)),
        )
        .await;

        let from = |ip: &str| {
            test::TestRequest::get()
                .uri("/")
                .peer_addr(format!("{ip}:4000").parse().unwrap())
                .to_request()
        };

        assert_eq!(test::call_service(&app, from("10.0.0.1")).await.status(), 200);
        assert_eq!(test::call_service(&app, from("10.0.0.2")).await.status(), 200);
        assert_eq!(test::call_service(&app, from("10.0.0.1")).await.status(), 429);
    }

    #[actix_web::test]
    async fn test_store_failure_fails_open() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(RateLimiter::new(Arc::new(BrokenStore), 1)))
                .wrap(from_fn(enforce_rate_limit))
                .route("/", web::get().to(ok)),
        )
        .await;

        for _ in 0..3 {
            let req = test::TestRequest::get().uri("/").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200);
            assert!(!resp.headers().contains_key("ratelimit-limit"));
        }
    }
}
