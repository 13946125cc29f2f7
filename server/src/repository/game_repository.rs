use async_trait::async_trait;
use log::{debug, warn};
use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Client, Collection};
use rand::Rng;

use crate::error::StoreError;
use crate::models::game_record::GameRecord;

pub const GAME_CODE_LEN: usize = 6;
const CREATE_ATTEMPTS: usize = 16;
const DUPLICATE_KEY: i32 = 11000;

/// Durable keyed storage for game records.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn find_game(&self, game_id: &str) -> Result<Option<GameRecord>, StoreError>;

    /// Inserts a new record. Returns false if the id is already taken.
    async fn insert_game(&self, game: &GameRecord) -> Result<bool, StoreError>;

    /// Full overwrite of an existing record; never creates one.
    async fn save_game(&self, game: &GameRecord) -> Result<(), StoreError>;

    /// Returns whether a record was actually removed.
    async fn delete_game(&self, game_id: &str) -> Result<bool, StoreError>;
}

pub fn generate_game_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GAME_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Creates an empty game under a fresh random code.
pub async fn create_game(store: &dyn GameStore) -> Result<GameRecord, StoreError> {
    for _ in 0..CREATE_ATTEMPTS {
        let code = generate_game_code(&mut rand::thread_rng());
        let game = GameRecord::new(code);
        if store.insert_game(&game).await? {
            debug!("created game {}", game.id);
            return Ok(game);
        }
        warn!("game code {} already taken, retrying", game.id);
    }
    Err(StoreError::IdSpace(CREATE_ATTEMPTS))
}

#[derive(Clone)]
pub struct MongoGameRepository {
    collection: Collection<GameRecord>,
}

impl MongoGameRepository {
    pub fn new(client: &Client, database: &str) -> Self {
        let collection = client.database(database).collection::<GameRecord>("games");
        Self { collection }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl GameStore for MongoGameRepository {
    async fn find_game(&self, game_id: &str) -> Result<Option<GameRecord>, StoreError> {
        Ok(self.collection.find_one(doc! { "_id": game_id }, None).await?)
    }

    async fn insert_game(&self, game: &GameRecord) -> Result<bool, StoreError> {
        match self.collection.insert_one(game, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_game(&self, game: &GameRecord) -> Result<(), StoreError> {
        let result = self
            .collection
            .replace_one(doc! { "_id": game.id.as_str() }, game, None)
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::Missing(game.id.clone()));
        }
        Ok(())
    }

    async fn delete_game(&self, game_id: &str) -> Result<bool, StoreError> {
        let result = self
            .collection
            .delete_one(doc! { "_id": game_id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory_repository::MemoryGameRepository;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn game_codes_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = generate_game_code(&mut rng);
            assert_eq!(code.len(), GAME_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn create_game_stores_an_empty_shell() {
        let store = MemoryGameRepository::default();
        let game = create_game(&store).await.unwrap();

        let stored = store.find_game(&game.id).await.unwrap().unwrap();
        assert_eq!(stored, GameRecord::new(game.id.clone()));
        assert!(stored.players.is_empty());
    }
}
