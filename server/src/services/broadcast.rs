use dashmap::DashMap;
use log::debug;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::models::messages::GroupEvent;

/// Fan-out of [`GroupEvent`]s to every connection currently registered under
/// a game code. Delivery to one member preserves broadcast order.
#[derive(Default)]
pub struct GameGroups {
    groups: DashMap<String, DashMap<Uuid, UnboundedSender<GroupEvent>>>,
}

impl GameGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, game_id: &str) -> (Uuid, UnboundedReceiver<GroupEvent>) {
        let token = Uuid::new_v4();
        let (tx, rx) = unbounded_channel();
        self.groups
            .entry(game_id.to_string())
            .or_default()
            .insert(token, tx);
        (token, rx)
    }

    /// Removes one membership. Returns true when the group is now empty.
    pub fn leave(&self, game_id: &str, token: Uuid) -> bool {
        if let Some(members) = self.groups.get(game_id) {
            members.remove(&token);
        }
        self.groups
            .remove_if(game_id, |_, members| members.is_empty())
            .is_some()
            || !self.groups.contains_key(game_id)
    }

    /// Returns how many members the event was handed to.
    pub fn broadcast(&self, game_id: &str, event: GroupEvent) -> usize {
        let Some(members) = self.groups.get(game_id) else {
            return 0;
        };
        let delivered = members
            .iter()
            .filter(|member| member.value().send(event.clone()).is_ok())
            .count();
        debug!("game {}: {:?} -> {} member(s)", game_id, event, delivered);
        delivered
    }

    pub fn members(&self, game_id: &str) -> usize {
        self.groups.get(game_id).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_member_in_order() {
        let groups = GameGroups::new();
        let (_, mut first) = groups.join("100000");
        let (_, mut second) = groups.join("100000");
        let (_, mut elsewhere) = groups.join("200000");

        assert_eq!(groups.broadcast("100000", GroupEvent::Ready), 2);
        assert_eq!(groups.broadcast("100000", GroupEvent::Main), 2);

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await, Some(GroupEvent::Ready));
            assert_eq!(rx.recv().await, Some(GroupEvent::Main));
        }
        assert!(elsewhere.try_recv().is_err());
    }

    #[tokio::test]
    async fn leaving_stops_delivery_and_drops_empty_groups() {
        let groups = GameGroups::new();
        let (alice, mut alice_rx) = groups.join("100000");
        let (bob, _bob_rx) = groups.join("100000");

        assert!(!groups.leave("100000", alice));
        assert_eq!(groups.broadcast("100000", GroupEvent::Abort), 1);
        assert!(alice_rx.try_recv().is_err());

        assert!(groups.leave("100000", bob));
        assert_eq!(groups.members("100000"), 0);
        assert_eq!(groups.broadcast("100000", GroupEvent::Abort), 0);
    }
}
