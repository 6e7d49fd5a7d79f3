//! Error types for each boundary, and how they surface to the user.

use thiserror::Error;

/// Local keypad evaluation failures.
#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("empty expression")]
    Empty,
    #[error("character '{0}' is not allowed")]
    DisallowedChar(char),
    #[error("unexpected '{found}' at position {pos}")]
    Unexpected { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("malformed number '{0}'")]
    BadNumber(String),
}

/// Failures talking to the solver model.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unreadable model reply: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("solve task aborted: {0}")]
    Aborted(String),
}

/// Camera device failures.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera access denied: {0}")]
    AccessDenied(String),
    #[error("camera is not streaming")]
    NotStreaming,
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),
}

/// Image file / clipboard ingestion failures.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("image is {0} bytes, limit is {1}")]
    TooLarge(usize, usize),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("clipboard: {0}")]
    Clipboard(String),
    #[error("not a base64 data URL")]
    NotDataUrl,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// The three user-visible failure kinds. Every notice is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    InvalidExpression,
    CameraDenied,
    ProcessingFailed,
}

impl NoticeKind {
    pub fn message(&self) -> &'static str {
        match self {
            NoticeKind::InvalidExpression => "Invalid expression",
            NoticeKind::CameraDenied => "Camera access denied",
            NoticeKind::ProcessingFailed => "Processing error, try again",
        }
    }
}

impl From<&CameraError> for NoticeKind {
    fn from(_: &CameraError) -> Self {
        NoticeKind::CameraDenied
    }
}

impl CameraError {
    /// Banner text. Capture failures get their own wording so the user
    /// knows the stream is still open for another try.
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::CaptureFailed(_) => "Camera capture failed",
            _ => NoticeKind::CameraDenied.message(),
        }
    }
}
