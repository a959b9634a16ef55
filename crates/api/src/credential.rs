use std::fmt::{self, Debug, Formatter};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Deserialize;

/// A bearer credential issued by the identity provider.
///
/// The credential is usually an ID token in JWT form. Its `exp` claim is
/// read once at construction. A token whose expiry cannot be read is
/// treated as already expired, so an unreadable token never reaches the
/// backend.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    token: String,
    expires_at: Option<u64>,
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

impl Credential {
    /// Creates a credential from a raw bearer token.
    pub fn new<S: Into<String>>(token: S) -> Self {
        let token = token.into();
        let expires_at = read_expiry(&token);
        Self { token, expires_at }
    }

    /// Returns the raw bearer token.
    #[inline]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the expiry as seconds since the Unix epoch, if the token
    /// carries one.
    #[inline]
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Checks whether the credential has expired at the given instant,
    /// expressed in seconds since the Unix epoch.
    #[inline]
    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        match self.expires_at {
            Some(exp) => exp <= now_secs,
            None => true,
        }
    }

    /// Checks whether the credential has expired by now.
    pub fn is_expired(&self) -> bool {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        self.is_expired_at(now)
    }

    /// Returns the value of the `Authorization` header.
    #[inline]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn read_expiry(token: &str) -> Option<u64> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let payload = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&payload).ok()?;
    let exp = claims.exp?;
    if exp.is_finite() && exp >= 0.0 {
        Some(exp as u64)
    } else {
        None
    }
}
