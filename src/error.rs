use thiserror::Error;

/// Every failure a bracket action can report. None of these are fatal to the
/// process; the HTTP layer maps each variant to a status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TournamentError {
    #[error("{0}")]
    Validation(String),
    #[error("No new players to add.")]
    NothingToAdd,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Persistence(String),
    #[error("{0}")]
    InvalidMove(String),
    #[error("{0}")]
    Config(String),
}

impl TournamentError {
    pub fn invalid_move(message: impl Into<String>) -> Self {
        TournamentError::InvalidMove(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        TournamentError::Persistence(message.into())
    }

    /// HTTP status used when this error crosses the server boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            TournamentError::Validation(_)
            | TournamentError::NothingToAdd
            | TournamentError::InvalidMove(_) => 400,
            TournamentError::Unauthorized(_) => 403,
            TournamentError::Persistence(_) => 502,
            TournamentError::Config(_) => 500,
        }
    }
}

pub type TournamentResult<T> = Result<T, TournamentError>;
