use serde::{Deserialize, Serialize};

pub const MAX_PLAYERS: usize = 2;
pub const FIRST_ROUND: u32 = 1;
pub const FINAL_ROUND: u32 = 5;

/// Die faces of one throw, in the order they were rolled. Empty means the
/// player has not rolled yet in the current round or sub-round.
pub type Roll = Vec<u8>;

/// The two places at the table. Player 1 is whoever joined first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Player1,
    Player2,
}

impl Seat {
    pub fn other(self) -> Self {
        match self {
            Seat::Player1 => Seat::Player2,
            Seat::Player2 => Seat::Player1,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    AwaitingPlayers,
    InProgress,
    Tiebreaker,
    Finished,
}

/// Canonical state of one match. Stored as a single document keyed by the
/// game code and only ever mutated through a serialized read-modify-write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub players: Vec<String>, // join order, never reordered
    #[serde(default)]
    pub connected_players: Vec<String>,
    #[serde(default)]
    pub player1_score: u32,
    #[serde(default)]
    pub player2_score: u32,
    #[serde(default = "first_round")]
    pub round: u32,
    #[serde(default)]
    pub current_player: Option<String>,
    #[serde(default)]
    pub player1_roll: Roll,
    #[serde(default)]
    pub player2_roll: Roll,
    #[serde(default)]
    pub tiebreaker: bool,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub winner: Option<String>,
}

fn first_round() -> u32 {
    FIRST_ROUND
}

impl GameRecord {
    /// Empty shell as produced by the creation API: no players, round one.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            players: Vec::new(),
            connected_players: Vec::new(),
            player1_score: 0,
            player2_score: 0,
            round: FIRST_ROUND,
            current_player: None,
            player1_roll: Vec::new(),
            player2_roll: Vec::new(),
            tiebreaker: false,
            finished: false,
            winner: None,
        }
    }

    pub fn player(&self, seat: Seat) -> Option<&str> {
        let index = match seat {
            Seat::Player1 => 0,
            Seat::Player2 => 1,
        };
        self.players.get(index).map(String::as_str)
    }

    pub fn player1(&self) -> Option<&str> {
        self.player(Seat::Player1)
    }

    pub fn player2(&self) -> Option<&str> {
        self.player(Seat::Player2)
    }

    pub fn seat_of(&self, user: &str) -> Option<Seat> {
        match self.players.iter().position(|p| p == user) {
            Some(0) => Some(Seat::Player1),
            Some(1) => Some(Seat::Player2),
            _ => None,
        }
    }

    /// Registers `user` as a player (first come, first seated) and marks them
    /// connected. Returns false when both seats already belong to others.
    pub fn admit(&mut self, user: &str) -> bool {
        if self.seat_of(user).is_none() {
            if self.players.len() >= MAX_PLAYERS {
                return false;
            }
            self.players.push(user.to_string());
        }
        if !self.is_connected(user) {
            self.connected_players.push(user.to_string());
        }
        true
    }

    pub fn disconnect(&mut self, user: &str) {
        self.connected_players.retain(|p| p != user);
    }

    pub fn is_connected(&self, user: &str) -> bool {
        self.connected_players.iter().any(|p| p == user)
    }

    pub fn connected_count(&self) -> usize {
        self.connected_players.len()
    }

    pub fn is_current(&self, user: &str) -> bool {
        self.current_player.as_deref() == Some(user)
    }

    pub fn current_seat(&self) -> Option<Seat> {
        self.current_player.as_deref().and_then(|p| self.seat_of(p))
    }

    /// Hands the turn to the other seat. No-op until both seats are taken.
    pub fn switch_turn(&mut self) {
        let next = self
            .current_seat()
            .and_then(|seat| self.player(seat.other()))
            .map(str::to_string);
        if next.is_some() {
            self.current_player = next;
        }
    }

    pub fn reset_turn(&mut self) {
        self.current_player = self.player1().map(str::to_string);
    }

    pub fn roll(&self, seat: Seat) -> &Roll {
        match seat {
            Seat::Player1 => &self.player1_roll,
            Seat::Player2 => &self.player2_roll,
        }
    }

    pub fn set_roll(&mut self, seat: Seat, roll: Roll) {
        match seat {
            Seat::Player1 => self.player1_roll = roll,
            Seat::Player2 => self.player2_roll = roll,
        }
    }

    pub fn both_rolled(&self) -> bool {
        !self.player1_roll.is_empty() && !self.player2_roll.is_empty()
    }

    pub fn clear_rolls(&mut self) {
        self.player1_roll.clear();
        self.player2_roll.clear();
    }

    /// Adds `points` to the seat's running total and returns the new total.
    pub fn add_score(&mut self, seat: Seat, points: u32) -> u32 {
        let total = match seat {
            Seat::Player1 => &mut self.player1_score,
            Seat::Player2 => &mut self.player2_score,
        };
        *total += points;
        *total
    }

    pub fn status(&self) -> GameStatus {
        if self.finished {
            GameStatus::Finished
        } else if self.tiebreaker {
            GameStatus::Tiebreaker
        } else if self.current_player.is_some() {
            GameStatus::InProgress
        } else {
            GameStatus::AwaitingPlayers
        }
    }
}

/// Read-only projection handed out by the HTTP API.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub id: String,
    pub players: Vec<String>,
    pub player1_score: u32,
    pub player2_score: u32,
    pub round: u32,
    pub status: GameStatus,
    pub finished: bool,
    pub winner: Option<String>,
}

impl From<&GameRecord> for GameSummary {
    fn from(record: &GameRecord) -> Self {
        Self {
            id: record.id.clone(),
            players: record.players.clone(),
            player1_score: record.player1_score,
            player2_score: record.player2_score,
            round: record.round,
            status: record.status(),
            finished: record.finished,
            winner: record.winner.clone(),
        }
    }
}
