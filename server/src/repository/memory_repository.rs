use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::game_record::GameRecord;
use crate::repository::game_repository::GameStore;

/// Process-local store for tests and single-node runs without MongoDB.
#[derive(Default)]
pub struct MemoryGameRepository {
    games: RwLock<HashMap<String, GameRecord>>,
}

#[async_trait]
impl GameStore for MemoryGameRepository {
    async fn find_game(&self, game_id: &str) -> Result<Option<GameRecord>, StoreError> {
        Ok(self.games.read().await.get(game_id).cloned())
    }

    async fn insert_game(&self, game: &GameRecord) -> Result<bool, StoreError> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.id) {
            return Ok(false);
        }
        games.insert(game.id.clone(), game.clone());
        Ok(true)
    }

    async fn save_game(&self, game: &GameRecord) -> Result<(), StoreError> {
        match self.games.write().await.get_mut(&game.id) {
            Some(slot) => {
                *slot = game.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(game.id.clone())),
        }
    }

    async fn delete_game(&self, game_id: &str) -> Result<bool, StoreError> {
        Ok(self.games.write().await.remove(game_id).is_some())
    }
}
