pub mod game_record;
pub mod messages;
