use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use dice_server::auth::create_token;
use dice_server::repository::MemoryGameRepository;
use dice_server::services::game_socket_service::{run_game_websocket_server, GameServer};

const SECRET: &[u8] = b"integration-secret";

async fn start() -> (SocketAddr, Arc<GameServer>) {
    start_with(None).await
}

async fn start_with(ack_timeout: Option<Duration>) -> (SocketAddr, Arc<GameServer>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(GameServer::new(
        Arc::new(MemoryGameRepository::default()),
        SECRET,
        ack_timeout,
    ));
    tokio::spawn(run_game_websocket_server(listener, Arc::clone(&server)));
    (addr, server)
}

fn url(addr: SocketAddr, game_id: &str, user: Option<&str>) -> String {
    match user {
        Some(user) => {
            let token = create_token(user, SECRET, Duration::from_secs(600)).unwrap();
            format!("ws://{}/ws/game/{}/?token={}", addr, game_id, token)
        }
        None => format!("ws://{}/ws/game/{}/", addr, game_id),
    }
}

/// Next text frame as JSON, or `None` once the server closes.
async fn next_json<S>(ws: &mut S) -> Option<Value>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for the server");
        match frame {
            Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).unwrap()),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

async fn expect_message<S>(ws: &mut S, expected: &str) -> Value
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let value = next_json(ws).await.expect("connection closed early");
    assert_eq!(value["message"], expected, "got {}", value);
    value
}

#[tokio::test]
async fn two_players_roll_and_an_abort_deletes_the_game() {
    let (addr, server) = start().await;
    let game = server.table().create().await.unwrap();

    let (mut alice, _) = connect_async(url(addr, &game.id, Some("alice"))).await.unwrap();
    expect_message(&mut alice, "waiting for another player").await;

    let (mut bob, _) = connect_async(url(addr, &game.id, Some("bob"))).await.unwrap();
    let ready = expect_message(&mut alice, "ready").await;
    assert_eq!(ready["player1"], "alice");
    assert_eq!(ready["player2"], "bob");
    expect_message(&mut bob, "ready").await;

    let roll = expect_message(&mut alice, "your roll").await;
    assert_eq!(roll["tiebreaker"], false);
    let dice = roll["roll"].as_array().unwrap().len();
    assert!(dice == 2 || dice == 3);

    alice.send(Message::Text("rolled".into())).await.unwrap();
    let update = expect_message(&mut alice, "update").await;
    assert_eq!(update["round"], 1);
    assert_eq!(update["player"], "alice");
    assert_eq!(update["roll"], roll["roll"]);

    let seen = expect_message(&mut bob, "alice's roll").await;
    assert_eq!(seen["roll"], roll["roll"]);
    expect_message(&mut bob, "update").await;
    expect_message(&mut bob, "your roll").await;

    // acknowledging out of turn is answered, not fatal
    alice.send(Message::Text("again".into())).await.unwrap();
    expect_message(&mut alice, "not your turn").await;

    bob.close(None).await.unwrap();
    let abort = expect_message(&mut alice, "player disconnected").await;
    assert_eq!(abort["abort"], true);
    assert_eq!(next_json(&mut alice).await, None);

    wait_for_deletion(&server, &game.id).await;
}

#[tokio::test]
async fn idle_roller_is_closed_and_the_game_aborted() {
    let (addr, server) = start_with(Some(Duration::from_millis(300))).await;
    let game = server.table().create().await.unwrap();

    let (mut alice, _) = connect_async(url(addr, &game.id, Some("alice"))).await.unwrap();
    expect_message(&mut alice, "waiting for another player").await;
    let (mut bob, _) = connect_async(url(addr, &game.id, Some("bob"))).await.unwrap();
    expect_message(&mut alice, "ready").await;
    expect_message(&mut bob, "ready").await;
    expect_message(&mut alice, "your roll").await;

    // alice never acknowledges
    assert_eq!(next_json(&mut alice).await, None);
    let abort = expect_message(&mut bob, "player disconnected").await;
    assert_eq!(abort["abort"], true);
    assert_eq!(next_json(&mut bob).await, None);

    wait_for_deletion(&server, &game.id).await;
}

#[tokio::test]
async fn connections_without_a_valid_identity_are_turned_away() {
    let (addr, server) = start().await;
    let game = server.table().create().await.unwrap();

    let (mut anonymous, _) = connect_async(url(addr, &game.id, None)).await.unwrap();
    expect_message(&mut anonymous, "unauthorised").await;
    assert_eq!(next_json(&mut anonymous).await, None);

    let forged = format!("ws://{}/ws/game/{}/?token=not.a.jwt", addr, game.id);
    let (mut forged, _) = connect_async(forged).await.unwrap();
    expect_message(&mut forged, "unauthorised").await;

    let (mut lost, _) = connect_async(url(addr, "no_such_game", Some("alice"))).await.unwrap();
    expect_message(&mut lost, "game does not exist").await;
    assert_eq!(next_json(&mut lost).await, None);

    assert_eq!(server.table().tracked_locks(), 0);
}

#[tokio::test]
async fn repeated_rejections_do_not_accumulate_locks() {
    let (addr, server) = start().await;
    let game = server.table().create().await.unwrap();

    for n in 0..50 {
        let target = if n % 2 == 0 {
            url(addr, &game.id, None)
        } else {
            url(addr, &format!("missing_{}", n), Some("alice"))
        };
        let (mut ws, _) = connect_async(target).await.unwrap();
        next_json(&mut ws).await.expect("rejection message");
        assert_eq!(next_json(&mut ws).await, None);
    }

    assert_eq!(server.table().tracked_locks(), 0);
}

#[tokio::test]
async fn unknown_endpoints_fail_the_upgrade() {
    let (addr, _server) = start().await;
    let result = connect_async(format!("ws://{}/ws/lobby/", addr)).await;
    assert!(result.is_err());
}

async fn wait_for_deletion(server: &GameServer, game_id: &str) {
    let table = server.table();
    let deleted = timeout(Duration::from_secs(5), async {
        while table.get(game_id).await.unwrap().is_some() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(deleted.is_ok(), "aborted game was not deleted");
}
