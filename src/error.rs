use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::docx::{ExtractionError, RenderError, TagIssue};
use crate::upload::UploadError;

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "No .docx template uploaded")]
    pub error: String,
    /// Per-tag problems, present when a template failed to render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<TagIssue>>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, issues: &[TagIssue]) -> Self {
        if !issues.is_empty() {
            self.details = Some(issues.to_vec());
        }
        self
    }
}

/// Client input that was rejected before any document work started.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No .docx template uploaded")]
    MissingTemplate,
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("Invalid JSON in data field: {0}")]
    MalformedData(#[source] serde_json::Error),
    #[error("The data field must be a JSON object")]
    DataNotObject,
    #[error("Invalid request body: {0}")]
    Body(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Failed to load the default template: {0}")]
    DefaultTemplate(#[source] std::io::Error),
    #[error("Document processing was interrupted")]
    Interrupted,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::DefaultTemplate(_) | ApiError::Interrupted => error!("{}", self),
            _ => warn!("Rejecting request: {}", self),
        }

        let body = match self {
            ApiError::Render(err) => {
                ErrorResponse::new(self.to_string()).with_details(err.issues())
            }
            _ => ErrorResponse::new(self.to_string()),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::TagIssueKind;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_missing_template_body_matches_contract() {
        let response = ApiError::from(ValidationError::MissingTemplate).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"No .docx template uploaded"}"#);
    }

    #[actix_web::test]
    async fn test_render_error_carries_every_issue() {
        let issues = vec![
            TagIssue::new(TagIssueKind::UnclosedLoop, "#a", "The loop with tag \"a\" is unclosed")
                .in_part("word/document.xml"),
            TagIssue::new(
                TagIssueKind::InvalidTag,
                "b c",
                "The tag \"b c\" is not a valid placeholder name",
            )
            .in_part("word/document.xml"),
        ];
        let response = ApiError::from(RenderError::Template(issues)).error_response();

        let body = to_bytes(response.into_body()).await.unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            parsed.error,
            "The loop with tag \"a\" is unclosed | The tag \"b c\" is not a valid placeholder name"
        );
        let details = parsed.details.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].kind, TagIssueKind::UnclosedLoop);
        assert_eq!(details[1].tag, "b c");
    }

    #[test]
    fn test_error_response_serialization_skips_empty_details() {
        let json = serde_json::to_string(&ErrorResponse::new("bad").with_details(&[])).unwrap();
        assert_eq!(json, r#"{"error":"bad"}"#);
    }
}
