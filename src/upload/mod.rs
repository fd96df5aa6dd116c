pub mod gate;
pub mod multipart_parser;

pub use gate::{RejectReason, UploadGate};
pub use multipart_parser::{MultipartParser, TemplateUpload, UploadError, UploadedTemplate};
