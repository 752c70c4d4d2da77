//! Error kinds raised while turning an uploaded bill into invoice data.

use thiserror::Error;

/// Failures of the extraction pipeline.
///
/// Regex misses never show up here: a heuristic that finds nothing simply
/// yields an empty hint.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("no text could be extracted from the PDF")]
    NoTextExtracted,

    #[error("OPENAI_API_KEY is not configured")]
    MissingCredential,

    #[error("malformed model reply: {message}")]
    MalformedModelReply { message: String },

    #[error("LLM request timed out after {seconds}s ({attempts} attempts)")]
    Timeout { seconds: u64, attempts: u32 },

    #[error("LLM transport error after {attempts} attempts: {message}")]
    Network { message: String, attempts: u32 },

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to load PDF: {message}")]
    Pdf { message: String },
}

impl ExtractionError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedModelReply {
            message: message.into(),
        }
    }

    pub fn pdf(message: impl Into<String>) -> Self {
        Self::Pdf {
            message: message.into(),
        }
    }

    /// Whether the whole batch must stop instead of moving on to the next file.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::MissingCredential)
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
