use chrono::{NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::db::AuthUser;

/// The logged-in player a request acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl From<&AuthUser> for SessionUser {
    fn from(user: &AuthUser) -> Self {
        SessionUser {
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Per-request state threaded through every service call: who is asking,
/// the wall-clock time the request is evaluated at, and its randomness.
pub struct RequestContext {
    pub user: Option<SessionUser>,
    pub now: NaiveDateTime,
    pub rng: StdRng,
}

impl RequestContext {
    pub fn new(user: Option<SessionUser>) -> Self {
        RequestContext {
            user,
            now: Utc::now().naive_utc(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn guest() -> Self {
        Self::new(None)
    }

    /// Fixed clock and seed, for replaying a request deterministically.
    pub fn at(user: Option<SessionUser>, now: NaiveDateTime, seed: u64) -> Self {
        RequestContext {
            user,
            now,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }
}
