//! Server-authoritative two player dice matches over WebSockets.
//!
//! Every roll and every score is computed here; clients only acknowledge the
//! roll they were shown. One [`services::connection::ConnectionActor`] runs per
//! socket and the two actors of a match coordinate through a broadcast group
//! keyed by the game code.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
