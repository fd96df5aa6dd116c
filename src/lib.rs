use std::path::PathBuf;
use std::sync::Arc;

use actix_files::Files;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::{from_fn, Compress, Logger};
use actix_web::{web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use env_logger::Env;
use log::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod docx;
pub mod error;
pub mod letter;
pub mod rate_limit;
pub mod security;
pub mod upload;

pub use crate::config::AppConfig;
pub use crate::error::{ApiError, ErrorResponse, ValidationError};
pub use crate::rate_limit::{InMemoryRateLimitStore, RateLimitStore, RateLimiter};

use crate::upload::UploadGate;

/// Per-request collaborators shared by the handlers.
pub struct AppState {
    pub default_template_path: PathBuf,
    pub upload_gate: UploadGate,
    /// Ceiling for the `/api/generate` body and multipart text fields.
    pub data_limit: usize,
    /// Decompressed size ceiling for each template part.
    pub part_limit: u64,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_template_path: config.default_template_path.clone(),
            upload_gate: UploadGate::new(config.max_upload_bytes),
            data_limit: config.json_limit_bytes,
            part_limit: config.max_part_bytes,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::letter::handlers::generate_from_default,
        crate::letter::handlers::upload_and_generate,
        crate::letter::handlers::inspect_template
    ),
    components(
        schemas(
            letter::models::OfficialLetterRequest,
            letter::models::InspectResponse,
            letter::models::UploadAndGenerateForm,
            letter::models::InspectTemplateForm,
            docx::TagIssue,
            docx::TagIssueKind,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Document Service", description = "Fill and inspect .docx templates.")
    ),
    servers(
        (url = "http://127.0.0.1:3000", description = "Localhost server")
    )
)]
pub struct ApiDoc;

/// Rate limiter backed by the in-process store.
pub fn in_memory_limiter(config: &AppConfig) -> web::Data<RateLimiter> {
    let store = InMemoryRateLimitStore::new(config.rate_limit.window);
    web::Data::new(RateLimiter::new(Arc::new(store), config.rate_limit.max_requests))
}

/// The whole application minus metrics. `limiter` must be shared across workers.
pub fn build_app(
    config: &AppConfig,
    limiter: web::Data<RateLimiter>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(AppState::from_config(config)))
        .app_data(limiter)
        .wrap(from_fn(rate_limit::enforce_rate_limit))
        .wrap(Compress::default())
        .wrap(security::build_cors(config))
        .wrap(security::security_headers())
        .wrap(Logger::default())
        .service(web::scope("/api").configure(letter::handlers::config))
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}")
                .url("/api-doc/openapi.json", ApiDoc::openapi()),
        )
        .service(Files::new("/", &config.static_dir).index_file("index.html"))
}

pub async fn run() -> std::io::Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let prometheus = match PrometheusMetricsBuilder::new("docx_template_server")
        .endpoint("/metrics")
        .build()
    {
        Ok(prometheus) => prometheus,
        Err(e) => {
            error!("Failed to create Prometheus metrics middleware: {}", e);
            std::process::exit(1);
        }
    };

    if !config.default_template_path.is_file() {
        warn!(
            "Default template {:?} not found, /api/generate will fail until it exists",
            config.default_template_path
        );
    }

    let limiter = in_memory_limiter(&config);
    let bind = (config.host.clone(), config.port);
    let workers = config.workers;

    info!("Starting server at http://{}:{}", bind.0, bind.1);

    let mut server = HttpServer::new(move || {
        build_app(&config, limiter.clone()).wrap(prometheus.clone())
    })
    .bind(bind)?;

    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    server.run().await
}
