//! Signed score tokens.
//!
//! A token is `base64(JSON{score, user_id, timestamp, nonce, hash})` where
//! `hash = hex(sha256("score|user_id|timestamp|nonce|secret"))`. This deters
//! naive tampering with a submitted score. It is not access control: the
//! algorithm is visible to clients and a deployment without `SCORE_SECRET`
//! signs with a secret that ships in the source.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::names;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenPayload {
    score: i64,
    user_id: Option<i64>,
    timestamp: i64,
    nonce: String,
    hash: String,
}

const REQUIRED_FIELDS: [&str; 5] = ["score", "user_id", "timestamp", "nonce", "hash"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("token is not valid base64 JSON")]
    Malformed,
    #[error("token is missing the '{0}' field")]
    MissingField(&'static str),
    #[error("token hash does not match its contents")]
    HashMismatch,
    #[error("token has expired")]
    Expired,
    #[error("token timestamp is in the future")]
    FutureTimestamp,
    #[error("token score does not match the submitted score")]
    ScoreMismatch,
    #[error("token belongs to a different user")]
    UserMismatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub valid: bool,
    pub reason: Option<RejectReason>,
    pub score: Option<i64>,
    pub user_id: Option<i64>,
    pub timestamp: Option<i64>,
}

impl Verification {
    fn rejected(reason: RejectReason) -> Self {
        Verification {
            valid: false,
            reason: Some(reason),
            score: None,
            user_id: None,
            timestamp: None,
        }
    }
}

/// What the verifying side expects a token to carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Expected {
    pub score: Option<i64>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ScoreSigner {
    secret: String,
    fallback: bool,
    max_age: Duration,
}

impl ScoreSigner {
    pub fn new(secret: Option<String>, max_age: Duration) -> Self {
        match secret.filter(|s| !s.is_empty()) {
            Some(secret) => ScoreSigner {
                secret,
                fallback: false,
                max_age,
            },
            None => {
                tracing::warn!(
                    "{} is not set; score tokens are signed with the built-in fallback secret and can be forged",
                    names::SCORE_SECRET_ENV
                );
                ScoreSigner {
                    secret: names::FALLBACK_SCORE_SECRET.to_string(),
                    fallback: true,
                    max_age,
                }
            }
        }
    }

    pub fn from_env(max_age: Duration) -> Self {
        Self::new(std::env::var(names::SCORE_SECRET_ENV).ok(), max_age)
    }

    pub fn uses_fallback_secret(&self) -> bool {
        self.fallback
    }

    pub fn sign(&self, score: i64, user_id: Option<i64>, timestamp: Option<i64>) -> String {
        let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());
        let nonce_bytes: [u8; 16] = rand::random();
        let nonce = to_hex(&nonce_bytes);
        let hash = self.digest(score, user_id, timestamp, &nonce);

        let payload = TokenPayload {
            score,
            user_id,
            timestamp,
            nonce,
            hash,
        };
        // Serializing a struct of plain numbers and strings cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn verify(&self, token: &str, expected: Expected) -> Verification {
        self.verify_at(token, expected, Utc::now().timestamp(), self.max_age)
    }

    pub fn verify_at(
        &self,
        token: &str,
        expected: Expected,
        now: i64,
        max_age: Duration,
    ) -> Verification {
        let Ok(bytes) = STANDARD.decode(token.trim()) else {
            return Verification::rejected(RejectReason::Malformed);
        };
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            return Verification::rejected(RejectReason::Malformed);
        };
        let Some(object) = value.as_object() else {
            return Verification::rejected(RejectReason::Malformed);
        };
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
            return Verification::rejected(RejectReason::MissingField(*missing));
        }
        let Ok(payload) = serde_json::from_value::<TokenPayload>(value) else {
            return Verification::rejected(RejectReason::Malformed);
        };

        // Overflow only happens for absurd timestamps; treat them as stale.
        let age = now.checked_sub(payload.timestamp);
        let reason = if self.digest(payload.score, payload.user_id, payload.timestamp, &payload.nonce)
            != payload.hash
        {
            Some(RejectReason::HashMismatch)
        } else if age.is_some_and(|age| age < 0) {
            Some(RejectReason::FutureTimestamp)
        } else if age.map_or(true, |age| age > max_age.num_seconds()) {
            Some(RejectReason::Expired)
        } else if expected.score.is_some_and(|s| s != payload.score) {
            Some(RejectReason::ScoreMismatch)
        } else if expected.user_id.is_some() && expected.user_id != payload.user_id {
            Some(RejectReason::UserMismatch)
        } else {
            None
        };

        if let Some(reason) = &reason {
            tracing::warn!("score token rejected: {reason}");
        }

        Verification {
            valid: reason.is_none(),
            reason,
            score: Some(payload.score),
            user_id: payload.user_id,
            timestamp: Some(payload.timestamp),
        }
    }

    fn digest(&self, score: i64, user_id: Option<i64>, timestamp: i64, nonce: &str) -> String {
        let user = user_id.map(|id| id.to_string()).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(format!("{score}|{user}|{timestamp}|{nonce}|{}", self.secret));
        format!("{:x}", hasher.finalize())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
