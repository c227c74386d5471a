use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProgress {
    pub url: String,
    pub bytes: u64,
    /// Declared `Content-Length`, when the server sent one.
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

impl FetchOutput {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Media type of the response without parameters, e.g. `text/html` for
    /// `text/html; charset=utf-8`.
    pub fn media_type(&self) -> Option<&str> {
        self.metadata
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    pub fn has_media_type(&self, expected: &str) -> bool {
        self.media_type()
            .is_some_and(|media_type| media_type.eq_ignore_ascii_case(expected))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnexpectedContentType { content_type: Option<String> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnexpectedContentType { content_type } => match content_type {
                Some(ct) => write!(f, "unexpected content type {ct}"),
                None => write!(f, "missing content type"),
            },
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
