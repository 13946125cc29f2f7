use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::models::game_record::GameRecord;
use crate::repository::game_repository::{create_game, GameStore};

/// The record store plus one write lock per game code. Both connections of a
/// match mutate the same record, so every read-modify-write goes through
/// [`GameTable::update`] and runs to completion before the next one starts.
pub struct GameTable {
    store: Arc<dyn GameStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl GameTable {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    async fn lock(&self, game_id: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(game_id.to_string()).or_default().value());
        lock.lock_owned().await
    }

    pub async fn create(&self) -> Result<GameRecord, StoreError> {
        create_game(self.store.as_ref()).await
    }

    /// Unserialized read of the latest persisted version.
    pub async fn get(&self, game_id: &str) -> Result<Option<GameRecord>, StoreError> {
        self.store.find_game(game_id).await
    }

    /// Reloads the record, applies `apply` and persists the result if it
    /// changed, all under the game's lock. `Ok(None)` means the record no
    /// longer exists.
    pub async fn update<T>(
        &self,
        game_id: &str,
        apply: impl FnOnce(&mut GameRecord) -> T,
    ) -> Result<Option<T>, StoreError> {
        let _guard = self.lock(game_id).await;
        let Some(mut record) = self.store.find_game(game_id).await? else {
            return Ok(None);
        };
        let before = record.clone();
        let output = apply(&mut record);
        if record != before {
            self.store.save_game(&record).await?;
        }
        Ok(Some(output))
    }

    /// Deletes the record only if `condition` holds for its latest version.
    /// `Ok(None)` means there was no record to check.
    pub async fn delete_if(
        &self,
        game_id: &str,
        condition: impl FnOnce(&GameRecord) -> bool,
    ) -> Result<Option<bool>, StoreError> {
        let _guard = self.lock(game_id).await;
        let Some(record) = self.store.find_game(game_id).await? else {
            return Ok(None);
        };
        if !condition(&record) {
            return Ok(Some(false));
        }
        let deleted = self.store.delete_game(game_id).await?;
        if deleted {
            debug!("deleted game {}", game_id);
        }
        Ok(Some(deleted))
    }

    /// Drops the game's lock entry when nobody holds or awaits it.
    pub fn prune(&self, game_id: &str) {
        self.locks
            .remove_if(game_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory_repository::MemoryGameRepository;

    fn table() -> Arc<GameTable> {
        Arc::new(GameTable::new(Arc::new(MemoryGameRepository::default())))
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let table = table();
        let game = table.create().await.unwrap();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let table = Arc::clone(&table);
                let id = game.id.clone();
                tokio::spawn(async move {
                    table
                        .update(&id, |record| {
                            record.player1_score += 1;
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }

        let stored = table.get(&game.id).await.unwrap().unwrap();
        assert_eq!(stored.player1_score, 64);
    }

    #[tokio::test]
    async fn update_on_a_deleted_game_is_none() {
        let table = table();
        let game = table.create().await.unwrap();

        assert_eq!(table.delete_if(&game.id, |_| true).await.unwrap(), Some(true));
        let result = table
            .update(&game.id, |record| record.admit("alice"))
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn conditional_delete_checks_the_latest_record() {
        let table = table();
        let game = table.create().await.unwrap();
        table
            .update(&game.id, |record| record.finished = true)
            .await
            .unwrap();

        let kept = table.delete_if(&game.id, |record| !record.finished).await;
        assert_eq!(kept.unwrap(), Some(false));
        assert!(table.get(&game.id).await.unwrap().is_some());

        let removed = table.delete_if(&game.id, |record| record.finished).await;
        assert_eq!(removed.unwrap(), Some(true));
        assert_eq!(table.delete_if(&game.id, |_| true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn prune_forgets_idle_locks() {
        let table = table();
        let game = table.create().await.unwrap();
        table.update(&game.id, |_| ()).await.unwrap();
        assert_eq!(table.tracked_locks(), 1);

        table.prune(&game.id);
        assert_eq!(table.tracked_locks(), 0);
    }
}
