pub mod broadcast;
pub mod connection;
pub mod dice;
pub mod game_socket_service;
pub mod game_table;
pub mod turn_engine;
