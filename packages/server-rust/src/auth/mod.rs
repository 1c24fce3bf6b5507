//! Identity pipeline: token service, password hashing, and the
//! transport-agnostic authentication interceptor.

pub mod interceptor;
pub mod password;
pub mod token;

pub use interceptor::{authenticate, resolve_request_id, UserRetriever};
pub use password::{PasswordHasher, SaltedSha256Hasher};
pub use token::{JwtTokenService, TokenService};
