use serde_json::{json, Value};

use crate::models::game_record::Roll;

/// Everything the server ever writes to a client socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    GameNotFound,
    GameFinished,
    Unauthorised,
    WaitingForPlayer,
    NotYourTurn,
    Ready {
        player1: String,
        player2: String,
    },
    YourRoll {
        roll: Roll,
        double: bool,
        tiebreaker: bool,
    },
    /// The opponent's roll, shown before the score update lands.
    OpponentRoll {
        player: String,
        roll: Roll,
        double: bool,
        tiebreaker: bool,
    },
    Update {
        round: u32,
        player: String,
        roll: Roll,
        score: u32,
    },
    End {
        winner: String,
        score: u32,
        tie: bool,
    },
    PlayerDisconnected,
}

impl ServerMessage {
    pub fn to_json(&self) -> Value {
        match self {
            ServerMessage::GameNotFound => json!({ "message": "game does not exist" }),
            ServerMessage::GameFinished => json!({ "message": "game has finished" }),
            ServerMessage::Unauthorised => json!({ "message": "unauthorised" }),
            ServerMessage::WaitingForPlayer => json!({ "message": "waiting for another player" }),
            ServerMessage::NotYourTurn => json!({ "message": "not your turn" }),
            ServerMessage::Ready { player1, player2 } => json!({
                "message": "ready",
                "player1": player1,
                "player2": player2,
            }),
            ServerMessage::YourRoll {
                roll,
                double,
                tiebreaker,
            } => json!({
                "message": "your roll",
                "roll": roll,
                "double": double,
                "tiebreaker": tiebreaker,
            }),
            ServerMessage::OpponentRoll {
                player,
                roll,
                double,
                tiebreaker,
            } => json!({
                "message": format!("{}'s roll", player),
                "roll": roll,
                "double": double,
                "tiebreaker": tiebreaker,
            }),
            ServerMessage::Update {
                round,
                player,
                roll,
                score,
            } => json!({
                "message": "update",
                "round": round,
                "player": player,
                "roll": roll,
                "score": score,
            }),
            ServerMessage::End { winner, score, tie } => json!({
                "message": "end",
                "winner": winner,
                "score": score,
                "tie": tie,
            }),
            ServerMessage::PlayerDisconnected => json!({
                "message": "player disconnected",
                "abort": true,
            }),
        }
    }

    pub fn to_text(&self) -> String {
        self.to_json().to_string()
    }
}

/// Events fanned out to every connection of one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    Ready,
    Abort,
    Main,
    PreUpdate {
        player: String,
        roll: Roll,
        double: bool,
        tiebreaker: bool,
    },
    Update {
        round: u32,
        player: String,
        roll: Roll,
        score: u32,
    },
    End {
        tie: bool,
    },
    EndTie,
}
