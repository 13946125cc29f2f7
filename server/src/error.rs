use thiserror::Error;

use crate::models::messages::ServerMessage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("game {0} does not exist")]
    Missing(String),
    #[error("could not allocate a free game code after {0} attempts")]
    IdSpace(usize),
}

/// Reasons a connection's request cannot be honoured.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("game does not exist")]
    NotFound,
    #[error("game has finished")]
    AlreadyFinished,
    #[error("unauthorised")]
    Unauthorized,
    #[error("not your turn")]
    OutOfTurn,
    #[error("waiting for another player")]
    Incomplete,
}

impl GameError {
    /// Terminal errors end the connection after the message is sent.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GameError::NotFound | GameError::AlreadyFinished | GameError::Unauthorized
        )
    }

    pub fn message(&self) -> ServerMessage {
        match self {
            GameError::NotFound => ServerMessage::GameNotFound,
            GameError::AlreadyFinished => ServerMessage::GameFinished,
            GameError::Unauthorized => ServerMessage::Unauthorised,
            GameError::OutOfTurn => ServerMessage::NotYourTurn,
            GameError::Incomplete => ServerMessage::WaitingForPlayer,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("missing bearer token")]
    MissingToken,
}
