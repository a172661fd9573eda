use serde::Serialize;

/// Failures surfaced by the game services.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("game {0} is already completed")]
    AlreadyCompleted(String),

    /// Another request updated the same game between our read and write.
    #[error("{0} was changed by another request")]
    Conflict(String),

    #[error("score verification failed: {0}")]
    IntegrityFailure(String),

    #[error("storage failure: {0}")]
    Storage(color_eyre::Report),
}

impl From<color_eyre::Report> for GameError {
    fn from(report: color_eyre::Report) -> Self {
        GameError::Storage(report)
    }
}

impl GameError {
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::NotFound(_) => "not_found",
            GameError::Invalid(_) => "invalid",
            GameError::AlreadyCompleted(_) => "already_completed",
            GameError::Conflict(_) => "conflict",
            GameError::IntegrityFailure(_) => "integrity_failure",
            GameError::Storage(_) => "storage_failure",
        }
    }
}

pub type GameResult<T> = std::result::Result<T, GameError>;

/// What a presentation layer receives instead of an error.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub success: bool,
    pub kind: &'static str,
    pub message: String,
}

/// Either the operation's record or a `{success: false, message}` failure.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResult<T> {
    Done(T),
    Failed(Failure),
}

impl<T> ActionResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Done(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            ActionResult::Done(_) => None,
            ActionResult::Failed(failure) => Some(failure),
        }
    }
}

impl<T> From<GameResult<T>> for ActionResult<T> {
    fn from(result: GameResult<T>) -> Self {
        match result {
            Ok(value) => ActionResult::Done(value),
            Err(err) => {
                let message = match &err {
                    GameError::Storage(report) => {
                        tracing::error!("storage failure: {report:?}");
                        "Something went wrong while saving the game. Please try again.".to_string()
                    }
                    GameError::IntegrityFailure(reason) => {
                        tracing::error!("score integrity check failed: {reason}");
                        err.to_string()
                    }
                    _ => err.to_string(),
                };
                ActionResult::Failed(Failure {
                    success: false,
                    kind: err.kind(),
                    message,
                })
            }
        }
    }
}
