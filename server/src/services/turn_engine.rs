//! Turn-by-turn decision logic for one match.
//!
//! Every function here takes the freshly loaded [`GameRecord`], mutates it in
//! place and returns the [`Effect`]s the calling connection must carry out
//! once the record has been persisted. Nothing in this module touches the
//! store, the network or a clock, so whole matches can be replayed with
//! scripted dice.

use std::cmp::Ordering;

use log::{debug, info, warn};

use crate::error::GameError;
use crate::models::game_record::{GameRecord, Roll, Seat, FINAL_ROUND, MAX_PLAYERS};
use crate::models::messages::{GroupEvent, ServerMessage};
use crate::services::dice::{is_double, roll_tiebreaker, roll_turn, score_roll, Dice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Sent to the acting connection only.
    Reply(ServerMessage),
    /// Fanned out to every connection of the game, the actor included.
    Broadcast(GroupEvent),
    /// Close the acting connection after the preceding replies.
    Close,
}

/// What woke the turn-holder's connection up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A group event asking whoever holds the turn to act.
    Event,
    /// The client acknowledged the roll it was shown.
    Acknowledge,
}

/// Admits `user` into the game. The second connected player starts the match.
pub fn join(record: &mut GameRecord, user: Option<&str>) -> Result<Vec<Effect>, GameError> {
    if record.finished {
        return Err(GameError::AlreadyFinished);
    }
    let user = user.ok_or(GameError::Unauthorized)?;
    if !record.admit(user) {
        return Err(GameError::Unauthorized);
    }
    if record.connected_count() != MAX_PLAYERS {
        return Ok(vec![Effect::Reply(ServerMessage::WaitingForPlayer)]);
    }
    if record.current_player.is_none() {
        record.reset_turn();
    }
    info!("game {} has both players connected", record.id);
    Ok(vec![
        Effect::Broadcast(GroupEvent::Ready),
        Effect::Broadcast(GroupEvent::Main),
    ])
}

pub fn leave(record: &mut GameRecord, user: &str) {
    record.disconnect(user);
}

pub fn ready(record: &GameRecord) -> Option<ServerMessage> {
    Some(ServerMessage::Ready {
        player1: record.player1()?.to_string(),
        player2: record.player2()?.to_string(),
    })
}

/// A client asked to advance the turn it is blocked on.
pub fn acknowledge<D: Dice + ?Sized>(
    record: &mut GameRecord,
    user: &str,
    dice: &mut D,
) -> Result<Vec<Effect>, GameError> {
    if record.connected_count() != MAX_PLAYERS {
        return Err(GameError::Incomplete);
    }
    if !record.is_current(user) {
        return Err(GameError::OutOfTurn);
    }
    if record.tiebreaker {
        Ok(tiebreaker_turn(record, user, dice, Trigger::Acknowledge))
    } else {
        Ok(main_turn(record, user, dice, Trigger::Acknowledge))
    }
}

/// One step of the five regular rounds.
///
/// The turn-holder without a roll this round is dealt one and the step ends
/// until the client acknowledges it. The acknowledgement scores the stored
/// roll, passes the turn and asks the group to run the next step.
pub fn main_turn<D: Dice + ?Sized>(
    record: &mut GameRecord,
    user: &str,
    dice: &mut D,
    trigger: Trigger,
) -> Vec<Effect> {
    if record.finished || record.tiebreaker || !record.is_current(user) {
        return Vec::new();
    }
    let Some(seat) = record.seat_of(user) else {
        return Vec::new();
    };

    if record.both_rolled() && seat == Seat::Player1 {
        if record.round >= FINAL_ROUND {
            info!("game {} finished its final round", record.id);
            return vec![Effect::Broadcast(GroupEvent::End { tie: false })];
        }
        record.round += 1;
        record.clear_rolls();
        debug!("game {} advanced to round {}", record.id, record.round);
    }

    if record.roll(seat).is_empty() {
        let roll = roll_turn(dice);
        let double = is_double(&roll);
        record.set_roll(seat, roll.clone());
        return vec![Effect::Reply(ServerMessage::YourRoll {
            roll,
            double,
            tiebreaker: false,
        })];
    }

    // Already waiting on this roll; only the client may move it along.
    if trigger == Trigger::Event {
        return Vec::new();
    }

    let roll = record.roll(seat).clone();
    let double = is_double(&roll);
    let score = record.add_score(seat, score_roll(&roll));
    let round = record.round;
    record.switch_turn();
    debug!(
        "game {}: {} rolled {:?} in round {}, total {}",
        record.id, user, roll, round, score
    );

    vec![
        Effect::Broadcast(GroupEvent::PreUpdate {
            player: user.to_string(),
            roll: roll.clone(),
            double,
            tiebreaker: false,
        }),
        Effect::Broadcast(GroupEvent::Update {
            round,
            player: user.to_string(),
            roll,
            score,
        }),
        Effect::Broadcast(GroupEvent::Main),
    ]
}

/// One step of the sudden-death single-die sub-round.
pub fn tiebreaker_turn<D: Dice + ?Sized>(
    record: &mut GameRecord,
    user: &str,
    dice: &mut D,
    trigger: Trigger,
) -> Vec<Effect> {
    if record.finished || !record.tiebreaker || !record.is_current(user) {
        return Vec::new();
    }
    let Some(seat) = record.seat_of(user) else {
        return Vec::new();
    };

    if record.roll(seat).is_empty() {
        let roll = roll_tiebreaker(dice);
        record.set_roll(seat, roll.clone());
        return vec![Effect::Reply(ServerMessage::YourRoll {
            roll,
            double: false,
            tiebreaker: true,
        })];
    }

    if trigger == Trigger::Event {
        return Vec::new();
    }

    let mut effects = vec![Effect::Broadcast(GroupEvent::PreUpdate {
        player: user.to_string(),
        roll: record.roll(seat).clone(),
        double: false,
        tiebreaker: true,
    })];

    if !record.both_rolled() {
        record.switch_turn();
        effects.push(Effect::Broadcast(GroupEvent::EndTie));
        return effects;
    }

    let winner = match record.player1_roll.cmp(&record.player2_roll) {
        Ordering::Greater => Seat::Player1,
        Ordering::Less => Seat::Player2,
        Ordering::Equal => {
            debug!("game {} tiebreaker drawn again, re-rolling", record.id);
            record.clear_rolls();
            record.reset_turn();
            effects.push(Effect::Broadcast(GroupEvent::EndTie));
            return effects;
        }
    };
    record.winner = record.player(winner).map(str::to_string);
    effects.push(Effect::Broadcast(GroupEvent::End { tie: true }));
    effects
}

/// End-of-match accounting. A level score after the final round opens the
/// tiebreaker instead of finishing.
pub fn end_match<D: Dice + ?Sized>(
    record: &mut GameRecord,
    user: &str,
    tie: bool,
    dice: &mut D,
) -> Vec<Effect> {
    if record.finished {
        return final_result(record);
    }

    if !tie {
        let winner = match record.player1_score.cmp(&record.player2_score) {
            Ordering::Greater => Seat::Player1,
            Ordering::Less => Seat::Player2,
            Ordering::Equal => {
                if !record.tiebreaker {
                    info!(
                        "game {} level at {}, entering tiebreaker",
                        record.id, record.player1_score
                    );
                    record.tiebreaker = true;
                    record.clear_rolls();
                    record.reset_turn();
                }
                return tiebreaker_turn(record, user, dice, Trigger::Event);
            }
        };
        record.winner = record.player(winner).map(str::to_string);
    }

    if record.winner.is_none() {
        warn!("game {} asked to end without a winner", record.id);
        return Vec::new();
    }
    record.finished = true;
    info!(
        "game {} won by {}",
        record.id,
        record.winner.as_deref().unwrap_or_default()
    );
    final_result(record)
}

fn final_result(record: &GameRecord) -> Vec<Effect> {
    let Some(winner) = record.winner.clone() else {
        return vec![Effect::Close];
    };
    // The winner holds the higher score, or the shared one after a tiebreaker.
    let score = record.player1_score.max(record.player2_score);
    vec![
        Effect::Reply(ServerMessage::End {
            winner,
            score,
            tie: record.tiebreaker,
        }),
        Effect::Close,
    ]
}

/// The opponent gets to see a roll before its score lands; the roller
/// already saw it in their `your roll` message.
pub fn pre_update(
    user: &str,
    player: &str,
    roll: &Roll,
    double: bool,
    tiebreaker: bool,
) -> Option<ServerMessage> {
    if user == player {
        return None;
    }
    Some(ServerMessage::OpponentRoll {
        player: player.to_string(),
        roll: roll.clone(),
        double,
        tiebreaker,
    })
}
