//! Structured error type shared by both transports.
//!
//! Every failure carries a machine-readable reason string, a human-readable
//! message, and an HTTP-status-equivalent code. The RPC transport serializes
//! errors as [`ErrorPayload`] inside an `ERROR` message; the HTTP gateway
//! maps the same payload to a JSON body plus the payload's status code, so
//! clients of either transport observe the same error shape.

use serde::{Deserialize, Serialize};

/// Classification of a failure.
///
/// Kinds are never downgraded as an error propagates outward; interceptors
/// only enrich an error with the request correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-fixable validation failure.
    InvalidArgument,
    /// Bearer token missing, malformed, expired, or badly signed.
    TokenInvalid,
    /// Token was valid but the subject could not be authenticated
    /// (e.g. the user no longer exists) or credentials did not match.
    Unauthenticated,
    /// The authorizer denied the operation.
    PermissionDenied,
    /// The addressed entity does not exist.
    NotFound,
    /// Storage read failure.
    ReadError,
    /// Storage write failure.
    WriteError,
    /// Unexpected server-side failure.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable reason string for this kind.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::TokenInvalid => "Unauthenticated.TokenInvalid",
            Self::Unauthenticated => "Unauthenticated",
            Self::PermissionDenied => "PermissionDenied",
            Self::NotFound => "NotFound",
            Self::ReadError => "InternalError.DBRead",
            Self::WriteError => "InternalError.DBWrite",
            Self::Internal => "InternalError",
        }
    }

    /// HTTP status code equivalent, used by the gateway.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidArgument => 400,
            Self::TokenInvalid | Self::Unauthenticated => 401,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::ReadError | Self::WriteError | Self::Internal => 500,
        }
    }

    /// Recovers a kind from its reason string. Unknown reasons collapse to
    /// [`ErrorKind::Internal`] so a decoding peer never loses an error.
    #[must_use]
    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "InvalidArgument" => Self::InvalidArgument,
            "Unauthenticated.TokenInvalid" => Self::TokenInvalid,
            "Unauthenticated" => Self::Unauthenticated,
            "PermissionDenied" => Self::PermissionDenied,
            "NotFound" => Self::NotFound,
            "InternalError.DBRead" => Self::ReadError,
            "InternalError.DBWrite" => Self::WriteError,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// A classified error with message and optional request correlation id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Correlation id of the call that produced this error, once the
    /// request-id interceptor has annotated it.
    pub request_id: Option<String>,
}

impl Error {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            request_id: None,
        }
    }

    /// Replaces the message, keeping the kind.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Annotates the error with the call's correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Shorthand for [`ErrorKind::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Shorthand for [`ErrorKind::TokenInvalid`].
    #[must_use]
    pub fn token_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenInvalid, message)
    }

    /// Shorthand for [`ErrorKind::Unauthenticated`].
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    /// Shorthand for [`ErrorKind::PermissionDenied`].
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Shorthand for [`ErrorKind::NotFound`].
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for [`ErrorKind::ReadError`].
    #[must_use]
    pub fn read(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReadError, message)
    }

    /// Shorthand for [`ErrorKind::WriteError`].
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WriteError, message)
    }

    /// Shorthand for [`ErrorKind::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Wire form of an [`Error`], identical on both transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// HTTP-status-equivalent code.
    pub code: u16,
    /// Stable machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// Correlation id of the failed call, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
}

impl From<&Error> for ErrorPayload {
    fn from(err: &Error) -> Self {
        Self {
            code: err.kind.http_status(),
            reason: err.kind.reason().to_string(),
            message: err.message.clone(),
            request_id: err.request_id.clone(),
        }
    }
}

impl From<ErrorPayload> for Error {
    fn from(payload: ErrorPayload) -> Self {
        Self {
            kind: ErrorKind::from_reason(&payload.reason),
            message: payload.message,
            request_id: payload.request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(ErrorKind::InvalidArgument.reason(), "InvalidArgument");
        assert_eq!(
            ErrorKind::TokenInvalid.reason(),
            "Unauthenticated.TokenInvalid"
        );
        assert_eq!(ErrorKind::ReadError.reason(), "InternalError.DBRead");
        assert_eq!(ErrorKind::WriteError.reason(), "InternalError.DBWrite");
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorKind::InvalidArgument.http_status(), 400);
        assert_eq!(ErrorKind::TokenInvalid.http_status(), 401);
        assert_eq!(ErrorKind::Unauthenticated.http_status(), 401);
        assert_eq!(ErrorKind::PermissionDenied.http_status(), 403);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Internal.http_status(), 500);
    }

    #[test]
    fn from_reason_roundtrips_every_kind() {
        for kind in [
            ErrorKind::InvalidArgument,
            ErrorKind::TokenInvalid,
            ErrorKind::Unauthenticated,
            ErrorKind::PermissionDenied,
            ErrorKind::NotFound,
            ErrorKind::ReadError,
            ErrorKind::WriteError,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_reason(kind.reason()), kind);
        }
    }

    #[test]
    fn unknown_reason_collapses_to_internal() {
        assert_eq!(ErrorKind::from_reason("Bogus.Reason"), ErrorKind::Internal);
    }

    #[test]
    fn payload_roundtrip_preserves_kind_and_request_id() {
        let err = Error::not_found("user not found").with_request_id("req-9");
        let payload = ErrorPayload::from(&err);
        assert_eq!(payload.code, 404);
        assert_eq!(payload.reason, "NotFound");
        assert_eq!(payload.request_id.as_deref(), Some("req-9"));

        let back = Error::from(payload);
        assert_eq!(back, err);
    }

    #[test]
    fn with_request_id_keeps_kind() {
        let err = Error::write("disk full").with_request_id("req-1");
        assert_eq!(err.kind, ErrorKind::WriteError);
        assert_eq!(err.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn display_includes_reason_and_message() {
        let err = Error::invalid_argument("limit cannot be negative");
        assert_eq!(
            err.to_string(),
            "InvalidArgument: limit cannot be negative"
        );
    }
}
