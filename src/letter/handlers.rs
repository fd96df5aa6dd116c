use actix_multipart::Multipart;
use actix_web::http::header::ContentDisposition;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use futures::StreamExt;
use log::{debug, info};

use crate::docx::{DocumentRenderer, RenderData, TemplateInspector, DOCX_MIME};
use crate::error::{ApiError, ErrorResponse, ValidationError};
use crate::letter::models::{
    parse_letter_request, parse_render_data, InspectResponse, InspectTemplateForm,
    OfficialLetterRequest, UploadAndGenerateForm,
};
use crate::upload::multipart_parser::is_multipart;
use crate::upload::{MultipartParser, TemplateUpload};
use crate::AppState;

pub const OFFICIAL_LETTER_FILENAME: &str = "Official_Letter.docx";
pub const GENERATED_FILENAME: &str = "Generated_From_Template.docx";

#[utoipa::path(
    context_path = "/api",
    tag = "Document Service",
    post,
    path = "/generate",
    request_body(
        content = OfficialLetterRequest,
        description = "JSON or url-encoded form. An empty body leaves every field empty."
    ),
    responses(
        (status = 200, description = "Official letter generated from the bundled template", content_type = "application/vnd.openxmlformats-officedocument.wordprocessingml.document", body = Vec<u8>),
        (status = 400, description = "Template could not be loaded or rendered", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    )
)]
pub async fn generate_from_default(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    info!("Executing generate_from_default handler");

    let body = read_body(payload, state.data_limit).await?;
    let mime = req.mime_type().ok().flatten();
    let request = parse_letter_request(mime.as_ref(), &body)?;

    let template = tokio::fs::read(&state.default_template_path)
        .await
        .map_err(ApiError::DefaultTemplate)?;
    debug!(
        "Loaded default template {:?} ({} bytes)",
        state.default_template_path,
        template.len()
    );

    let data = request.into_render_data();
    let document = render_blocking(template, data, state.part_limit).await?;
    info!("Generated official letter ({} bytes)", document.len());
    Ok(docx_attachment(document, OFFICIAL_LETTER_FILENAME))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Document Service",
    post,
    path = "/upload-and-generate",
    request_body(content = inline(UploadAndGenerateForm), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document generated from the uploaded template", content_type = "application/vnd.openxmlformats-officedocument.wordprocessingml.document", body = Vec<u8>),
        (status = 400, description = "Invalid upload, malformed data or template errors", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    )
)]
pub async fn upload_and_generate(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    info!("Executing upload_and_generate handler");

    let upload = read_upload(&req, payload, &state).await?;
    let template = upload.template.ok_or(ValidationError::MissingTemplate)?;
    let data = parse_render_data(upload.data.as_deref())?;
    debug!(
        "Rendering uploaded template '{}' with {} data keys",
        template.filename,
        data.len()
    );

    let document = render_blocking(template.bytes, data, state.part_limit).await?;
    info!("Generated document from '{}' ({} bytes)", template.filename, document.len());
    Ok(docx_attachment(document, GENERATED_FILENAME))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Document Service",
    post,
    path = "/inspect-template",
    request_body(content = inline(InspectTemplateForm), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Placeholders found in the template", body = InspectResponse),
        (status = 400, description = "Invalid upload or unreadable template", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    )
)]
pub async fn inspect_template(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    info!("Executing inspect_template handler");

    let upload = read_upload(&req, payload, &state).await?;
    let template = upload.template.ok_or(ValidationError::MissingTemplate)?;

    let inspector = TemplateInspector::with_part_limit(state.part_limit);
    let placeholders = web::block(move || inspector.inspect(&template.bytes))
        .await
        .map_err(|_| ApiError::Interrupted)??;
    info!("Found {} placeholders", placeholders.len());
    Ok(HttpResponse::Ok().json(InspectResponse { placeholders }))
}

async fn read_upload(
    req: &HttpRequest,
    payload: web::Payload,
    state: &AppState,
) -> Result<TemplateUpload, ValidationError> {
    if !is_multipart(req) {
        debug!("Request is not multipart/form-data, no template to read");
        return Ok(TemplateUpload::default());
    }

    let multipart = Multipart::new(req.headers(), payload);
    let upload =
        MultipartParser::parse_template_multipart(multipart, &state.upload_gate, state.data_limit)
            .await?;
    Ok(upload)
}

async fn read_body(
    mut payload: web::Payload,
    limit: usize,
) -> Result<web::BytesMut, ValidationError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| ValidationError::Body(e.to_string()))?;
        if body.len() + chunk.len() > limit {
            return Err(ValidationError::Body(format!(
                "payload exceeds the {} byte limit",
                limit
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn render_blocking(
    template: Vec<u8>,
    data: RenderData,
    part_limit: u64,
) -> Result<Vec<u8>, ApiError> {
    let renderer = DocumentRenderer::with_part_limit(part_limit);
    let document = web::block(move || renderer.render(&template, &data))
        .await
        .map_err(|_| ApiError::Interrupted)??;
    Ok(document)
}

fn docx_attachment(document: Vec<u8>, filename: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(DOCX_MIME)
        .insert_header(ContentDisposition::attachment(filename))
        .body(document)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/generate").route(web::post().to(generate_from_default)))
        .service(web::resource("/upload-and-generate").route(web::post().to(upload_and_generate)))
        .service(web::resource("/inspect-template").route(web::post().to(inspect_template)));
}
