//! Contact list ingestion
//!
//! Upload → parse → normalize → distribute → persist. Each stage lives in its
//! own module; [`pipeline`] sequences them and owns the staged upload file.

pub mod batch_writer;
pub mod distributor;
pub mod normalizer;
pub mod parser;
pub mod pipeline;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub use batch_writer::replace_distribution;
pub use distributor::{distribute, Bucket};
pub use normalizer::{normalize_record, normalize_rows, ContactField, MissingFields};
pub use parser::{parse_rows, FileFormat, RawRecord};
pub use pipeline::{AgentItemCount, ListPipeline, PipelineStage, TempUpload, UploadSummary};

/// Everything that can stop an upload
#[derive(Debug, Error)]
pub enum IngestError {
    /// Request carried no `file` part
    #[error("Please upload a file")]
    NoFileProvided,

    /// Multipart body could not be read
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    /// Upload exceeded the configured size limit
    #[error("File too large. Maximum size is {0} bytes")]
    FileTooLarge(usize),

    /// Extension is not .csv, .xlsx or .xls
    #[error("Invalid file format '{0}'. Only .csv, .xlsx, and .xls files are allowed")]
    UnsupportedFormat(String),

    /// File content is structurally invalid
    #[error("Could not parse file: {0}")]
    ParseFailure(String),

    /// No data rows
    #[error("File is empty or contains no valid data")]
    EmptyFile,

    /// At least one row lacks firstName or phone; the whole upload is rejected
    #[error(
        "File contains rows without required fields (firstName, phone): \
         {invalid_rows} invalid row(s), first at data row {first_invalid_row} missing {}",
        field_list(.missing)
    )]
    MissingRequiredFields {
        invalid_rows: usize,
        first_invalid_row: usize,
        missing: Vec<ContactField>,
    },

    /// Roster is empty
    #[error("No agents found. Please add agents before uploading lists")]
    NoAgentsAvailable,

    /// Store write failed; the previous distribution is unchanged
    #[error("Failed to save distribution: {0}")]
    PersistenceFailure(String),

    /// Anything else
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

fn field_list(fields: &[ContactField]) -> String {
    fields
        .iter()
        .map(ContactField::name)
        .collect::<Vec<_>>()
        .join(", ")
}

impl IngestError {
    /// Map a store error raised while writing a distribution
    pub fn from_store(err: roster_common::Error) -> Self {
        IngestError::PersistenceFailure(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::NoFileProvided
            | IngestError::MalformedUpload(_)
            | IngestError::UnsupportedFormat(_)
            | IngestError::ParseFailure(_)
            | IngestError::EmptyFile
            | IngestError::MissingRequiredFields { .. }
            | IngestError::NoAgentsAvailable => StatusCode::BAD_REQUEST,
            IngestError::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::PersistenceFailure(_) | IngestError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::NoFileProvided => "NO_FILE_PROVIDED",
            IngestError::MalformedUpload(_) => "MALFORMED_UPLOAD",
            IngestError::FileTooLarge(_) => "FILE_TOO_LARGE",
            IngestError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            IngestError::ParseFailure(_) => "PARSE_FAILURE",
            IngestError::EmptyFile => "EMPTY_FILE",
            IngestError::MissingRequiredFields { .. } => "MISSING_REQUIRED_FIELDS",
            IngestError::NoAgentsAvailable => "NO_AGENTS_AVAILABLE",
            IngestError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            IngestError::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Unexpected(format!("IO error: {}", err))
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the log
        let message = match &self {
            IngestError::Unexpected(_) => "Server error while processing the upload".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "code": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        for err in [
            IngestError::NoFileProvided,
            IngestError::UnsupportedFormat(".txt".to_string()),
            IngestError::ParseFailure("bad".to_string()),
            IngestError::EmptyFile,
            IngestError::NoAgentsAvailable,
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{:?}", err);
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_server_errors() {
        assert_eq!(
            IngestError::PersistenceFailure("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            IngestError::Unexpected("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_fields_message_names_fields() {
        let err = IngestError::MissingRequiredFields {
            invalid_rows: 2,
            first_invalid_row: 3,
            missing: vec![ContactField::FirstName, ContactField::Phone],
        };
        let message = err.to_string();
        assert!(message.contains("2 invalid row(s)"));
        assert!(message.contains("data row 3"));
        assert!(message.contains("firstName, phone"));
    }
}
