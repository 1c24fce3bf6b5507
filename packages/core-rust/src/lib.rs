//! Quill Core — wire protocol, request context, errors, resource ids, and
//! the generic validation engine shared by the RPC service and the HTTP
//! gateway.

pub mod context;
pub mod error;
pub mod messages;
pub mod rid;
pub mod validation;

pub use context::{Identity, RequestContext};
pub use error::{Error, ErrorKind, ErrorPayload, Result};
pub use messages::Message;
pub use rid::{derive_resource_id, ResourceKind};
pub use validation::{validate_all_fields, FieldValue, Rules, Validatable};
