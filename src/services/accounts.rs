use chrono::NaiveDateTime;
use color_eyre::Result;

use crate::context::SessionUser;
use crate::db::{AuthUser, Db};
use crate::error::{GameError, GameResult};

// ---------------------------------------------------------------------------
// AccountRepository trait
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait AccountRepository: Send + Sync {
    fn username_or_email_taken(
        &self,
        username: &str,
        email: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<i64>> + Send;

    fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<AuthUser>>> + Send;

    fn record_ip(
        &self,
        user_id: i64,
        ip_address: &str,
        at: NaiveDateTime,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

impl AccountRepository for Db {
    fn username_or_email_taken(
        &self,
        username: &str,
        email: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send {
        Db::username_or_email_taken(self, username, email)
    }

    fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<i64>> + Send {
        Db::create_user(self, username, email, password)
    }

    fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send {
        Db::verify_user_password(self, username, password)
    }

    fn find_user_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<AuthUser>>> + Send {
        Db::find_user_by_username(self, username)
    }

    fn record_ip(
        &self,
        user_id: i64,
        ip_address: &str,
        at: NaiveDateTime,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        Db::record_ip(self, user_id, ip_address, at)
    }
}

// ---------------------------------------------------------------------------
// Outcome enums
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum LoginOutcome {
    Success(SessionUser),
    /// Wrong password, unknown username or a deactivated account.
    InvalidCredentials,
}

const MIN_PASSWORD_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// AccountService
// ---------------------------------------------------------------------------

pub struct AccountService<R: AccountRepository = Db> {
    repo: R,
}

impl<R: AccountRepository + Clone> Clone for AccountService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R: AccountRepository> AccountService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates the account and returns its id.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> GameResult<i64> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(GameError::Invalid("username, email and password are required".to_string()));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(GameError::Invalid(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        if self.repo.username_or_email_taken(username, email).await? {
            return Err(GameError::Invalid("username or email is already registered".to_string()));
        }

        Ok(self.repo.create_user(username, email, password).await?)
    }

    /// Checks the password and remembers the address the login came from.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ip_address: Option<&str>,
        at: NaiveDateTime,
    ) -> Result<LoginOutcome> {
        if !self.repo.verify_user_password(username, password).await? {
            return Ok(LoginOutcome::InvalidCredentials);
        }

        let user = self
            .repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| color_eyre::eyre::eyre!("user not found after password verification"))?;

        if let Some(ip) = ip_address {
            self.repo.record_ip(user.id, ip, at).await?;
        }

        tracing::info!("user {} logged in", user.username);
        Ok(LoginOutcome::Success(SessionUser::from(&user)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
