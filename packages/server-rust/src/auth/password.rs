//! Password encryption and comparison.
//!
//! The hashing primitive is an external collaborator behind
//! [`PasswordHasher`]; the provided implementation salts and digests with
//! SHA-256 and compares in constant time.

use quill_core::{Error, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Encrypts plaintext passwords and compares candidates against the
/// stored form.
pub trait PasswordHasher: Send + Sync {
    /// Encrypts a plaintext password into its stored form.
    fn hash(&self, plain: &str) -> Result<String>;

    /// Compares a candidate password against the stored form.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` on mismatch; `Internal` when the stored form is
    /// unreadable.
    fn verify(&self, hashed: &str, plain: &str) -> Result<()>;
}

/// Salted SHA-256 implementation. Stored form:
/// `sha256$<salt-hex>$<digest-hex>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaltedSha256Hasher;

impl SaltedSha256Hasher {
    fn digest(salt: &[u8], plain: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(plain.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl PasswordHasher for SaltedSha256Hasher {
    fn hash(&self, plain: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let digest = Self::digest(&salt, plain);
        Ok(format!(
            "{SCHEME}${}${}",
            hex::encode(salt),
            hex::encode(digest)
        ))
    }

    fn verify(&self, hashed: &str, plain: &str) -> Result<()> {
        let mut parts = hashed.split('$');
        let (scheme, salt_hex, digest_hex) = match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(salt), Some(digest)) => (scheme, salt, digest),
            _ => return Err(Error::internal("stored password has an unrecognized format")),
        };
        if scheme != SCHEME {
            return Err(Error::internal(format!(
                "unsupported password scheme: {scheme}"
            )));
        }
        let salt = hex::decode(salt_hex)
            .map_err(|_| Error::internal("stored password salt is not hex"))?;
        let expected = hex::decode(digest_hex)
            .map_err(|_| Error::internal("stored password digest is not hex"))?;

        let computed = Self::digest(&salt, plain);
        if bool::from(computed.ct_eq(&expected)) {
            Ok(())
        } else {
            Err(Error::unauthenticated("password does not match"))
        }
    }
}
