//! Stateless signed session tokens.
//!
//! Token layout: `username.expiry_unix.mac_hex`, where the MAC is a blake3
//! keyed hash over `username.expiry_unix` with a key derived from the
//! configured session secret. No server-side session state; logout is a
//! cookie clear, and a restart with the same secret keeps sessions valid.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const KEY_CONTEXT: &str = "heartwise session token v1";

/// Issues and verifies signed session tokens.
#[derive(Clone)]
pub struct SessionKeeper {
    key: [u8; 32],
    ttl: Duration,
}

impl SessionKeeper {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token for an authenticated username.
    ///
    /// Usernames containing the separator are rejected by the verifier's
    /// parse, so the token stays unambiguous.
    pub fn issue(&self, username: &str) -> String {
        let expiry = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .saturating_add(self.ttl.as_secs());
        let payload = format!("{username}.{expiry}");
        let mac = blake3::keyed_hash(&self.key, payload.as_bytes());
        format!("{payload}.{}", mac.to_hex())
    }

    /// Verify a token, returning the username when the MAC checks out and
    /// the token has not expired.
    pub fn verify(&self, token: &str) -> Option<String> {
        // rsplit: usernames must not contain '.', but parse defensively.
        let (payload, mac_hex) = token.rsplit_once('.')?;
        let (username, expiry_str) = payload.rsplit_once('.')?;
        if username.is_empty() || username.contains('.') {
            return None;
        }
        let expiry: u64 = expiry_str.parse().ok()?;

        let expected = blake3::keyed_hash(&self.key, payload.as_bytes());
        let provided = blake3::Hash::from_hex(mac_hex).ok()?;
        // blake3::Hash equality is constant-time.
        if expected != provided {
            return None;
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        if now > expiry {
            return None;
        }

        Some(username.to_string())
    }
}
