//! Error types for Penpot operations.
//!
//! Error messages never include credentials or auth tokens.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Longest response body kept in an [`PenpotError::Api`] message.
pub const MAX_ERROR_BODY_LEN: usize = 2000;

/// Result type for Penpot operations.
pub type PenpotResult<T> = Result<T, PenpotError>;

/// Errors that can occur while talking to Penpot or preparing changes for it.
#[derive(Debug, Error)]
pub enum PenpotError {
    /// A wire payload lacks a required structural field, or has it in the wrong shape.
    #[error("Format error at '{path}': {message}")]
    Format {
        /// Location of the offending field (e.g. `obj.content.type`).
        path: String,
        /// Description of what's wrong.
        message: String,
    },

    /// A declarative intent is missing a field its shape kind requires.
    #[error("Validation error on field '{field}': {message}")]
    Validation {
        /// Name of the offending field.
        field: String,
        /// Description of what's wrong.
        message: String,
    },

    /// The server revision moved since the session began.
    #[error("Revision conflict on file {file_id}: revision {revision} is no longer current")]
    RevisionConflict {
        /// File the update targeted.
        file_id: String,
        /// Revision the update was submitted with.
        revision: u64,
    },

    /// The platform rejected the credentials or the session expired.
    #[error("Not authenticated with Penpot (HTTP {status})")]
    Unauthenticated {
        /// HTTP status returned by the platform.
        status: u16,
    },

    /// A CloudFlare challenge blocked the request.
    #[error(
        "CloudFlare protection blocked the request (HTTP {status}). Open Penpot in a browser, \
         log in and complete the verification challenge, then retry"
    )]
    CloudFlare {
        /// HTTP status returned by the platform.
        status: u16,
    },

    /// Any other non-success response from the platform.
    #[error("Penpot API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status returned by the platform.
        status: u16,
        /// Response body, truncated to [`MAX_ERROR_BODY_LEN`].
        body: String,
    },

    /// An object id was not found in the file.
    #[error("Object not found: {object_id}")]
    ObjectNotFound {
        /// The missing object id.
        object_id: String,
    },

    /// An update-session operation was called in the wrong state.
    #[error("Update session is {actual}, expected {expected}")]
    SessionState {
        /// State the session was in.
        actual: &'static str,
        /// State the operation requires.
        expected: &'static str,
    },

    /// No username/password are configured.
    #[error("Penpot credentials missing: set PENPOT_USERNAME and PENPOT_PASSWORD")]
    MissingCredentials,

    /// Network or protocol failure in the HTTP client.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body was not valid JSON.
    #[error("Invalid JSON from Penpot: {0}")]
    Json(#[from] serde_json::Error),
}

impl PenpotError {
    /// Creates a format error.
    pub fn format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing-field validation error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("'{field}' is required");
        Self::Validation { field, message }
    }

    /// Creates a revision conflict error.
    pub fn revision_conflict(file_id: impl Into<String>, revision: u64) -> Self {
        Self::RevisionConflict {
            file_id: file_id.into(),
            revision,
        }
    }

    /// Creates an API error, truncating long bodies.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > MAX_ERROR_BODY_LEN {
            let mut cut = MAX_ERROR_BODY_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("... (truncated)");
        }
        Self::Api { status, body }
    }

    /// Creates an object-not-found error.
    pub fn object_not_found(object_id: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            object_id: object_id.into(),
        }
    }

    /// Returns true for the transport signal that triggers re-authentication.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    /// Machine-readable error category reported to tool callers.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Format { .. } => "format_error",
            Self::Validation { .. } => "validation_error",
            Self::RevisionConflict { .. } => "revision_conflict",
            Self::Unauthenticated { .. } | Self::MissingCredentials => "authentication_error",
            Self::CloudFlare { .. } => "cloudflare_protection",
            Self::Api { .. } => "api_error",
            Self::ObjectNotFound { .. } => "object_not_found",
            Self::SessionState { .. } => "session_state",
            Self::Http(_) => "transport_error",
            Self::Json(_) => "invalid_response",
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated { status }
            | Self::CloudFlare { status }
            | Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Soft notice attached to every successful update.
///
/// The platform may apply a batch asynchronously, and an open editor tab can
/// overwrite it, so a read issued right after a successful submit is not
/// guaranteed to reflect the write. Callers that need confirmation poll the
/// read path themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleReadWarning {
    /// File that was written.
    pub file_id: String,
    /// Revision returned by the submit.
    pub revision: u64,
}

impl fmt::Display for StaleReadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "revision {} of file {} was accepted, but a subsequent read may not reflect it yet",
            self.revision, self.file_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_field() {
        let err = PenpotError::missing_field("width");
        assert_eq!(
            err.to_string(),
            "Validation error on field 'width': 'width' is required"
        );
        assert_eq!(err.error_type(), "validation_error");
    }

    #[test]
    fn revision_conflict_display() {
        let err = PenpotError::revision_conflict("file-1", 7);
        assert_eq!(
            err.to_string(),
            "Revision conflict on file file-1: revision 7 is no longer current"
        );
    }

    #[test]
    fn api_error_truncates_body() {
        let err = PenpotError::api(500, "x".repeat(MAX_ERROR_BODY_LEN + 50));
        let PenpotError::Api { body, status } = &err else {
            panic!("expected Api error");
        };
        assert_eq!(*status, 500);
        assert!(body.ends_with("... (truncated)"));
        assert_eq!(body.len(), MAX_ERROR_BODY_LEN + "... (truncated)".len());
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn unauthenticated_is_distinguishable() {
        assert!(PenpotError::Unauthenticated { status: 401 }.is_unauthenticated());
        assert!(!PenpotError::api(401, "").is_unauthenticated());
    }

    #[test]
    fn stale_read_warning_display() {
        let warning = StaleReadWarning {
            file_id: "f".to_string(),
            revision: 3,
        };
        assert!(warning.to_string().contains("revision 3 of file f"));
    }
}
