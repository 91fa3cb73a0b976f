//! Anti-forgery Tokens
//!
//! A token is an HMAC-SHA256 over `tick|action|user`, truncated to 10 bytes
//! and hex-encoded. A tick lasts half of the token lifetime, and both the
//! current and the previous tick are accepted, so a token stays valid for
//! between 12 and 24 hours.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Action name every checkout form is tied to
pub const CHECKOUT_ACTION: &str = "kagg_create_checkout";

const TOKEN_BYTES: usize = 10;
const NONCE_LIFETIME_SECS: i64 = 86_400;

/// Issues and verifies tokens bound to a logical action
pub trait NonceVerifier: Send + Sync {
    /// Token for `action` performed by `user`
    fn issue(&self, action: &str, user: &str) -> String;

    /// Whether `token` was issued for this `action` and `user` and is still fresh
    fn verify(&self, token: &str, action: &str, user: &str) -> bool;
}

/// HMAC-backed nonce issuer
pub struct HmacNonce {
    secret: Vec<u8>,
}

impl HmacNonce {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn tick(now: DateTime<Utc>) -> i64 {
        now.timestamp().div_euclid(NONCE_LIFETIME_SECS / 2)
    }

    fn mac(&self, tick: i64, action: &str, user: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(format!("{tick}|{action}|{user}").as_bytes());
        mac
    }

    pub fn issue_at(&self, action: &str, user: &str, now: DateTime<Utc>) -> String {
        let tag = self.mac(Self::tick(now), action, user).finalize().into_bytes();
        hex::encode(&tag[..TOKEN_BYTES])
    }

    pub fn verify_at(&self, token: &str, action: &str, user: &str, now: DateTime<Utc>) -> bool {
        let Ok(tag) = hex::decode(token.trim()) else {
            return false;
        };
        if tag.len() != TOKEN_BYTES {
            return false;
        }

        let tick = Self::tick(now);
        [tick, tick - 1].into_iter().any(|t| {
            self.mac(t, action, user)
                .verify_truncated_left(&tag)
                .is_ok()
        })
    }
}

impl NonceVerifier for HmacNonce {
    fn issue(&self, action: &str, user: &str) -> String {
        self.issue_at(action, user, Utc::now())
    }

    fn verify(&self, token: &str, action: &str, user: &str) -> bool {
        self.verify_at(token, action, user, Utc::now())
    }
}
