pub mod game_repository;
pub mod memory_repository;

pub use game_repository::{create_game, GameStore, MongoGameRepository};
pub use memory_repository::MemoryGameRepository;
