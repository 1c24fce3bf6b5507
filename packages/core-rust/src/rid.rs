//! Public resource id derivation.
//!
//! Entities are addressed externally by a prefixed resource id
//! (`user-000001`, `post-00000a`) rather than by their numeric surrogate
//! key. The id is a pure function of the entity kind and the surrogate key,
//! derived once after the first insert succeeds and never reassigned;
//! deriving twice for the same key yields the same id.

use std::fmt;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Minimum width of the encoded key part, zero-padded on the left.
const MIN_WIDTH: usize = 6;

/// Entity kinds that carry a public resource id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A user account (`user-` prefix).
    User,
    /// A blog post (`post-` prefix).
    Post,
}

impl ResourceKind {
    /// The id prefix for this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Derives the public resource id for a surrogate key.
///
/// The encoding is lowercase base-36, left-padded to six characters, so ids
/// are deterministic, injective per kind, and sort roughly by creation
/// order.
///
/// # Examples
///
/// ```
/// use quill_core::rid::{derive_resource_id, ResourceKind};
///
/// assert_eq!(derive_resource_id(ResourceKind::User, 1), "user-000001");
/// assert_eq!(derive_resource_id(ResourceKind::Post, 10), "post-00000a");
/// ```
#[must_use]
pub fn derive_resource_id(kind: ResourceKind, key: u64) -> String {
    format!("{}-{}", kind.prefix(), encode_base36(key))
}

/// Encodes a key as lowercase base-36, zero-padded to [`MIN_WIDTH`].
fn encode_base36(mut key: u64) -> String {
    let mut digits = Vec::with_capacity(MIN_WIDTH);
    loop {
        let rem = usize::try_from(key % 36).unwrap_or(0);
        digits.push(ALPHABET[rem]);
        key /= 36;
        if key == 0 {
            break;
        }
    }
    while digits.len() < MIN_WIDTH {
        digits.push(b'0');
    }
    digits.reverse();
    // ALPHABET is ASCII, so the byte sequence is valid UTF-8.
    String::from_utf8(digits).unwrap_or_default()
}
