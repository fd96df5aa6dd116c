use actix_web::mime::{self, Mime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::docx::RenderData;
use crate::error::ValidationError;

/// Fields of the bundled official letter template. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfficialLetterRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "001/KEL-CB/X/2026")]
    pub ref_no: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "14 October 2026")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "Head of District")]
    pub recipient_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "Jl. Raya Bekasi No. 1\nJakarta Timur")]
    pub recipient_address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "Invitation to the monthly coordination meeting")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "We kindly invite you to attend the meeting on Monday.")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "Jane Doe")]
    pub sender_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "Village Head")]
    pub sender_position: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "Cakung Barat Village Office")]
    pub organization: String,
}

impl OfficialLetterRequest {
    /// Template data keyed by the placeholder names used in the bundled letter.
    pub fn into_render_data(self) -> RenderData {
        [
            ("refNo", self.ref_no),
            ("date", self.date),
            ("recipientName", self.recipient_name),
            ("recipientAddress", self.recipient_address),
            ("subject", self.subject),
            ("content", self.content),
            ("senderName", self.sender_name),
            ("senderPosition", self.sender_position),
            ("organization", self.organization),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::String(value)))
        .collect()
    }
}

/// Decode a `/api/generate` body.
///
/// JSON and url-encoded forms are parsed. A blank body, or one of any other
/// type, leaves every field empty.
pub fn parse_letter_request(
    content_type: Option<&Mime>,
    body: &[u8],
) -> Result<OfficialLetterRequest, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(OfficialLetterRequest::default());
    }

    match content_type {
        Some(m) if is_json(m) => {
            serde_json::from_slice(body).map_err(|e| ValidationError::Body(e.to_string()))
        }
        Some(m) if m.type_() == mime::APPLICATION && m.subtype() == mime::WWW_FORM_URLENCODED => {
            serde_urlencoded::from_bytes(body).map_err(|e| ValidationError::Body(e.to_string()))
        }
        _ => Ok(OfficialLetterRequest::default()),
    }
}

fn is_json(m: &Mime) -> bool {
    m.type_() == mime::APPLICATION && (m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
}

/// Accept any JSON scalar as text; `null` reads as empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {}",
            match other {
                Value::Array(_) => "an array",
                _ => "an object",
            }
        ))),
    }
}

/// Parse the `data` text field of an upload. A missing field means no data.
pub fn parse_render_data(raw: Option<&str>) -> Result<RenderData, ValidationError> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(RenderData::new());
    };

    match serde_json::from_str::<Value>(raw).map_err(ValidationError::MalformedData)? {
        Value::Object(map) => Ok(map),
        _ => Err(ValidationError::DataNotObject),
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InspectResponse {
    #[schema(example = json!(["refNo", "date"]))]
    pub placeholders: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadAndGenerateForm {
    /// The `.docx` template, at most 5 MiB.
    #[allow(unused)]
    #[schema(value_type = String, format = Binary)]
    pub template: Vec<u8>,
    /// JSON object with the values to substitute.
    #[allow(unused)]
    #[schema(example = r#"{"name":"Jane","items":[{"label":"A"}]}"#)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InspectTemplateForm {
    #[allow(unused)]
    #[schema(value_type = String, format = Binary)]
    pub template: Vec<u8>,
}
