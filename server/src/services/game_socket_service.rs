use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep_until, Duration, Instant};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use crate::auth::{identity_from_token, Identity};
use crate::repository::GameStore;
use crate::services::broadcast::GameGroups;
use crate::services::connection::{ConnectionActor, Outgoing};
use crate::services::dice::RandomDice;
use crate::services::game_table::GameTable;

/// Shared state behind every game connection.
pub struct GameServer {
    table: Arc<GameTable>,
    groups: Arc<GameGroups>,
    jwt_secret: Vec<u8>,
    ack_timeout: Option<Duration>,
}

impl GameServer {
    pub fn new(
        store: Arc<dyn GameStore>,
        jwt_secret: impl Into<Vec<u8>>,
        ack_timeout: Option<Duration>,
    ) -> Self {
        Self {
            table: Arc::new(GameTable::new(store)),
            groups: Arc::new(GameGroups::new()),
            jwt_secret: jwt_secret.into(),
            ack_timeout,
        }
    }

    pub fn table(&self) -> Arc<GameTable> {
        Arc::clone(&self.table)
    }

    pub fn groups(&self) -> Arc<GameGroups> {
        Arc::clone(&self.groups)
    }
}

/// Accepts connections until the listener fails, one task per socket.
pub async fn run_game_websocket_server(listener: TcpListener, server: Arc<GameServer>) {
    if let Ok(addr) = listener.local_addr() {
        info!("game websocket server listening on {}", addr);
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("accept failed: {}", e);
                continue;
            }
        };
        debug!("tcp connection from {}", peer);
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            handle_connection(stream, server).await;
        });
    }
}

struct Handshake {
    game_id: String,
    token: Option<String>,
}

async fn handle_connection(stream: TcpStream, server: Arc<GameServer>) {
    let mut handshake: Option<Handshake> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let Some(game_id) = parse_game_path(request.uri().path()) else {
            let mut rejection = ErrorResponse::new(Some("no such game endpoint".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            return Err(rejection);
        };
        let header = request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok());
        handshake = Some(Handshake {
            game_id: game_id.to_string(),
            token: extract_token(header, request.uri().query()),
        });
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("websocket handshake failed: {}", e);
            return;
        }
    };
    let Some(handshake) = handshake else {
        return;
    };

    let identity = identity_from_token(handshake.token.as_deref(), &server.jwt_secret);
    if identity == Identity::Anonymous {
        debug!("anonymous connection to game {}", handshake.game_id);
    }
    let actor = ConnectionActor::new(
        handshake.game_id,
        identity,
        server.table(),
        server.groups(),
        RandomDice::new(),
    );
    drive(ws_stream, actor, server.ack_timeout).await;
}

async fn drive(
    ws_stream: WebSocketStream<TcpStream>,
    mut actor: ConnectionActor<RandomDice>,
    ack_timeout: Option<Duration>,
) {
    let (mut write, mut read) = ws_stream.split();

    let admission = match actor.on_connect().await {
        Ok(admission) => admission,
        Err(e) => {
            error!("could not load game {}: {}", actor.game_id(), e);
            let _ = write.send(Message::Close(None)).await;
            return;
        }
    };
    let mut open = deliver(&mut write, admission.outgoing).await;
    let Some(mut events) = admission.events else {
        return;
    };

    let mut deadline = ack_deadline(&actor, ack_timeout);
    while open {
        let outgoing = tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(_))) => actor.on_client_acknowledge().await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!("read error on game {}: {}", actor.game_id(), e);
                    break;
                }
            },
            event = events.recv() => match event {
                Some(event) => actor.on_event(event).await,
                None => break,
            },
            _ = wait_for(deadline) => {
                info!(
                    "{} did not acknowledge in time, closing",
                    actor.identity().username().unwrap_or_default()
                );
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        };

        match outgoing {
            Ok(outgoing) => open = deliver(&mut write, outgoing).await,
            Err(e) => {
                error!("store failure on game {}: {}", actor.game_id(), e);
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        }
        if !actor.awaiting_ack() {
            deadline = None;
        } else if deadline.is_none() {
            deadline = ack_deadline(&actor, ack_timeout);
        }
    }

    if let Err(e) = actor.on_disconnect().await {
        error!("disconnect cleanup failed for game {}: {}", actor.game_id(), e);
    }
}

fn ack_deadline(actor: &ConnectionActor<RandomDice>, timeout: Option<Duration>) -> Option<Instant> {
    match timeout {
        Some(timeout) if actor.awaiting_ack() => Some(Instant::now() + timeout),
        _ => None,
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Writes messages in order. Returns false once the socket should stop.
async fn deliver<S>(write: &mut S, outgoing: Vec<Outgoing>) -> bool
where
    S: Sink<Message> + Unpin,
{
    for item in outgoing {
        match item {
            Outgoing::Message(message) => {
                if write.send(Message::Text(message.to_text())).await.is_err() {
                    return false;
                }
            }
            Outgoing::Close => {
                let _ = write.send(Message::Close(None)).await;
                return false;
            }
        }
    }
    true
}

/// `/ws/game/<id>/` with an optional trailing slash; `<id>` is one or more
/// word characters.
pub fn parse_game_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/ws/game/")?;
    let id = rest.strip_suffix('/').unwrap_or(rest);
    let valid = !id.is_empty() && id.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then_some(id)
}

/// Bearer header first, then the `token` query parameter.
pub fn extract_token(authorization: Option<&str>, query: Option<&str>) -> Option<String> {
    if let Some(token) = authorization.and_then(|h| h.strip_prefix("Bearer ")) {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == "token" && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
