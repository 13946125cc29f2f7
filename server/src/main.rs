use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};
use tokio::net::TcpListener;

use dice_server::config::mongo_config::setup_mongo;
use dice_server::config::settings::{Settings, StoreKind};
use dice_server::repository::{GameStore, MemoryGameRepository, MongoGameRepository};
use dice_server::services::game_socket_service::{run_game_websocket_server, GameServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let settings = Settings::parse();

    let store: Arc<dyn GameStore> = match settings.store {
        StoreKind::Mongo => {
            let client = setup_mongo(&settings.mongo_uri).await?;
            info!("using mongo database {}", settings.database);
            Arc::new(MongoGameRepository::new(&client, &settings.database))
        }
        StoreKind::Memory => {
            warn!("using the in-memory store, games are lost on restart");
            Arc::new(MemoryGameRepository::default())
        }
    };

    let server = Arc::new(GameServer::new(
        store,
        settings.jwt_secret.as_bytes(),
        settings.ack_timeout(),
    ));
    let listener = TcpListener::bind(&settings.bind).await?;

    tokio::select! {
        _ = run_game_websocket_server(listener, server) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutting down");
        }
    }
    Ok(())
}
