//! Source identity: secret codename and the anonymous id derived from it.
//!
//! The codename is the only credential a source has. It lives in the
//! request-scoped session and is never written anywhere; the anonymous id
//! derived from it is what names the source's storage namespace.

pub mod codename;
pub mod deriver;

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{GeoDropError, GeoDropResult};

pub use codename::generate_codename;
pub use deriver::IdentityDeriver;

/// Length of an anonymous id in hex characters (32-byte digest).
pub const ANONYMOUS_ID_LEN: usize = 64;

/// Human-memorable secret phrase held by a source.
pub struct Codename(SecretString);

impl Codename {
    pub fn new<S: Into<String>>(value: S) -> Self {
        let boxed: Box<str> = value.into().into_boxed_str();
        Self(SecretString::new(boxed))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for Codename {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Codename").field(&"<redacted>").finish()
    }
}

/// One-way identifier of a source; the storage-namespace key.
///
/// Always 64 lowercase hex characters, so it is safe to use as a single
/// path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnonymousId(String);

impl AnonymousId {
    pub(crate) fn from_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse an id received from outside (CLI argument, directory listing).
    pub fn parse(s: &str) -> GeoDropResult<Self> {
        let valid = s.len() == ANONYMOUS_ID_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(GeoDropError::InvalidIdentity(format!(
                "expected {} lowercase hex characters",
                ANONYMOUS_ID_LEN
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnonymousId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AnonymousId {
    type Error = GeoDropError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AnonymousId> for String {
    fn from(id: AnonymousId) -> Self {
        id.0
    }
}
