use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::{GameError, StoreError};
use crate::models::messages::{GroupEvent, ServerMessage};
use crate::services::broadcast::GameGroups;
use crate::services::dice::{Dice, RandomDice};
use crate::services::game_table::GameTable;
use crate::services::turn_engine::{self, Effect, Trigger};

/// What the socket should do on behalf of the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Message(ServerMessage),
    Close,
}

/// Result of [`ConnectionActor::on_connect`]. `events` is `None` when the
/// connection was turned away; `outgoing` then ends with [`Outgoing::Close`].
pub struct Admission {
    pub outgoing: Vec<Outgoing>,
    pub events: Option<UnboundedReceiver<GroupEvent>>,
}

/// Mediates between one client connection and the shared game record.
pub struct ConnectionActor<D: Dice = RandomDice> {
    game_id: String,
    identity: Identity,
    table: Arc<GameTable>,
    groups: Arc<GameGroups>,
    dice: D,
    membership: Option<Uuid>,
    awaiting_ack: bool,
}

impl<D: Dice> ConnectionActor<D> {
    pub fn new(
        game_id: impl Into<String>,
        identity: Identity,
        table: Arc<GameTable>,
        groups: Arc<GameGroups>,
        dice: D,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            identity,
            table,
            groups,
            dice,
            membership: None,
            awaiting_ack: false,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// True between sending `your roll` and the client's acknowledgement.
    pub fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    pub async fn on_connect(&mut self) -> Result<Admission, StoreError> {
        let (token, events) = self.groups.join(&self.game_id);
        let user = self.identity.username();
        let joined = self
            .table
            .update(&self.game_id, |record| turn_engine::join(record, user))
            .await;

        let rejection = match joined {
            Ok(Some(Ok(effects))) => {
                self.membership = Some(token);
                info!(
                    "{} joined game {}",
                    user.unwrap_or_default(),
                    self.game_id
                );
                return Ok(Admission {
                    outgoing: self.dispatch(effects),
                    events: Some(events),
                });
            }
            Ok(Some(Err(e))) => e,
            Ok(None) => GameError::NotFound,
            Err(e) => {
                self.groups.leave(&self.game_id, token);
                self.table.prune(&self.game_id);
                return Err(e);
            }
        };

        self.groups.leave(&self.game_id, token);
        self.table.prune(&self.game_id);
        info!("turned away connection to game {}: {}", self.game_id, rejection);
        Ok(Admission {
            outgoing: reject(&rejection),
            events: None,
        })
    }

    pub async fn on_disconnect(&mut self) -> Result<(), StoreError> {
        let Some(token) = self.membership.take() else {
            return Ok(());
        };
        let Some(user) = self.identity.username().map(str::to_string) else {
            return Ok(());
        };

        // The finished flag is read under the game lock, together with the leave.
        let left = self
            .table
            .update(&self.game_id, |record| {
                turn_engine::leave(record, &user);
                !record.finished
            })
            .await;
        let unfinished = match left {
            Ok(Some(unfinished)) => unfinished,
            Ok(None) | Err(StoreError::Missing(_)) => false,
            Err(e) => {
                self.groups.leave(&self.game_id, token);
                self.table.prune(&self.game_id);
                return Err(e);
            }
        };
        if unfinished {
            info!("{} left game {} mid-match, aborting", user, self.game_id);
            self.groups.broadcast(&self.game_id, GroupEvent::Abort);
        }

        if self.groups.leave(&self.game_id, token) {
            self.table.prune(&self.game_id);
        }
        Ok(())
    }

    pub async fn on_client_acknowledge(&mut self) -> Result<Vec<Outgoing>, StoreError> {
        if self.membership.is_none() {
            return Ok(Vec::new());
        }
        let Some(user) = self.identity.username() else {
            return Ok(Vec::new());
        };
        let dice = &mut self.dice;
        let result = self
            .table
            .update(&self.game_id, |record| {
                turn_engine::acknowledge(record, user, dice)
            })
            .await?;

        match result {
            Some(Ok(effects)) => {
                self.awaiting_ack = false;
                Ok(self.dispatch(effects))
            }
            Some(Err(e)) => Ok(reject(&e)),
            None => Ok(Vec::new()),
        }
    }

    pub async fn on_event(&mut self, event: GroupEvent) -> Result<Vec<Outgoing>, StoreError> {
        let Some(user) = self.identity.username().map(str::to_string) else {
            return Ok(Vec::new());
        };
        let game_id = self.game_id.clone();
        let dice = &mut self.dice;

        let effects = match event {
            GroupEvent::Ready => {
                let record = self.table.get(&game_id).await?;
                record
                    .as_ref()
                    .and_then(turn_engine::ready)
                    .map(Effect::Reply)
                    .into_iter()
                    .collect()
            }
            GroupEvent::Abort => {
                match self.table.delete_if(&game_id, |record| !record.finished).await {
                    Ok(Some(false)) => {
                        debug!("ignoring abort for finished game {}", game_id);
                        Vec::new()
                    }
                    outcome => {
                        if let Err(e) = outcome {
                            warn!("could not delete aborted game {}: {}", game_id, e);
                        }
                        vec![
                            Effect::Reply(ServerMessage::PlayerDisconnected),
                            Effect::Close,
                        ]
                    }
                }
            }
            GroupEvent::Main => self
                .table
                .update(&game_id, |record| {
                    turn_engine::main_turn(record, &user, dice, Trigger::Event)
                })
                .await?
                .unwrap_or_default(),
            GroupEvent::EndTie => self
                .table
                .update(&game_id, |record| {
                    turn_engine::tiebreaker_turn(record, &user, dice, Trigger::Event)
                })
                .await?
                .unwrap_or_default(),
            GroupEvent::End { tie } => self
                .table
                .update(&game_id, |record| {
                    turn_engine::end_match(record, &user, tie, dice)
                })
                .await?
                .unwrap_or_default(),
            GroupEvent::PreUpdate {
                player,
                roll,
                double,
                tiebreaker,
            } => turn_engine::pre_update(&user, &player, &roll, double, tiebreaker)
                .map(Effect::Reply)
                .into_iter()
                .collect(),
            GroupEvent::Update {
                round,
                player,
                roll,
                score,
            } => vec![Effect::Reply(ServerMessage::Update {
                round,
                player,
                roll,
                score,
            })],
        };

        Ok(self.dispatch(effects))
    }

    /// Broadcasts go out immediately; replies and closes are handed back to
    /// the socket in order. Only called once the record has been persisted.
    fn dispatch(&mut self, effects: Vec<Effect>) -> Vec<Outgoing> {
        let mut outgoing = Vec::new();
        for effect in effects {
            match effect {
                Effect::Reply(message) => {
                    if matches!(message, ServerMessage::YourRoll { .. }) {
                        self.awaiting_ack = true;
                    }
                    outgoing.push(Outgoing::Message(message));
                }
                Effect::Broadcast(event) => {
                    if self.groups.broadcast(&self.game_id, event) == 0 {
                        warn!("game {} has no listeners left", self.game_id);
                    }
                }
                Effect::Close => outgoing.push(Outgoing::Close),
            }
        }
        outgoing
    }
}

/// The error's message, followed by a close when the error ends the connection.
fn reject(error: &GameError) -> Vec<Outgoing> {
    let mut outgoing = vec![Outgoing::Message(error.message())];
    if error.is_terminal() {
        outgoing.push(Outgoing::Close);
    }
    outgoing
}
