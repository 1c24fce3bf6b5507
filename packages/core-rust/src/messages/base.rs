//! Transport envelopes and call metadata.
//!
//! A call on the binary RPC transport is a length-delimited MsgPack frame
//! containing a [`RequestEnvelope`]; the server answers with a
//! [`ResponseEnvelope`] carrying the same `call_id`. Metadata mirrors what
//! the HTTP gateway carries in headers: the bearer credential and the
//! request correlation id. All structs use named `MsgPack` serialization
//! (`rmp_serde::to_vec_named()`) with camelCase field names so the same
//! types serialize to equivalent JSON on the gateway.

use serde::{Deserialize, Serialize};

use super::Message;

/// Metadata header name for the bearer credential.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// Metadata header name for the request correlation id.
pub const REQUEST_ID_KEY: &str = "x-request-id";

/// Per-call transport metadata.
///
/// Both fields are optional on the way in: an absent `request_id` makes the
/// server mint one, an absent `authorization` fails authentication for
/// protected operations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    /// Client-supplied correlation id, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
    /// Bearer credential (`Bearer <token>`), if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub authorization: Option<String>,
}

impl CallMetadata {
    /// Extracts the raw token from the `Bearer <token>` credential.
    ///
    /// Returns `None` when the credential is absent or does not use the
    /// bearer scheme.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.authorization
            .as_deref()
            .and_then(|credential| credential.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
    }
}

/// One request frame on the RPC transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Correlates the response frame on a multiplexed connection.
    pub call_id: u64,
    /// Transport metadata (credential, correlation id).
    #[serde(default)]
    pub metadata: CallMetadata,
    /// The operation request message.
    pub body: Message,
}

/// One response frame on the RPC transport.
///
/// `request_id` is always present on the way out: the server echoes the
/// inbound id or the one it minted, so clients can correlate retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// The `call_id` of the request this frame answers.
    pub call_id: u64,
    /// The call's correlation id, echoed outward.
    pub request_id: String,
    /// The response message, or an `ERROR` message on failure.
    pub body: Message,
}
