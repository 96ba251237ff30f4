use rocket::http::Status;

/// Failures scoped to a single admission request.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] Malformed),
    #[error("failed to decode {kind}: {message}")]
    Decode { kind: &'static str, message: String },
    #[error("received empty AdmissionReview request")]
    MissingRequestContext,
    #[error("invalid network selection '{selection}': {reason}")]
    Grammar { selection: String, reason: String },
    #[error("failed to write response: {0}")]
    Transport(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Malformed {
    #[error("empty body")]
    EmptyBody,
    #[error("error reading body: {0}")]
    UnreadableBody(String),
    #[error("invalid Content-Type={0}, expected application/json")]
    ContentType(String),
}

impl WebhookError {
    pub(crate) fn decode(kind: &'static str, err: impl std::fmt::Display) -> Self {
        WebhookError::Decode {
            kind,
            message: err.to_string(),
        }
    }

    pub(crate) fn grammar(selection: &str, reason: impl Into<String>) -> Self {
        WebhookError::Grammar {
            selection: selection.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status used when the error prevents an AdmissionReview answer.
    pub fn http_status(&self) -> Status {
        match self {
            WebhookError::MalformedRequest(Malformed::ContentType(_)) => {
                Status::UnsupportedMediaType
            }
            WebhookError::MalformedRequest(_)
            | WebhookError::Decode { .. }
            | WebhookError::MissingRequestContext
            | WebhookError::Grammar { .. } => Status::BadRequest,
            WebhookError::Transport(_) => Status::InternalServerError,
        }
    }
}

pub type Result<T, E = WebhookError> = std::result::Result<T, E>;
