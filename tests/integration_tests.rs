//! Integration tests for the game server
//!
//! These tests drive whole games through the coordinator with a manual clock,
//! and run the real WebSocket server on an ephemeral port.

use server::clock::ManualClock;
use server::config::ServerConfig;
use server::coordinator::Coordinator;
use server::level::Level;
use server::lobby::LobbyState;
use server::session::{Connection, ConnectionId, PlayerSession, ReadyState};
use shared::{DirectionKey, InputEvent, RenderData, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const TICK: Duration = Duration::from_millis(4);

/// A coordinator driven by hand, with one open connection per player.
struct Game {
    coordinator: Coordinator,
    clock: Arc<ManualClock>,
    players: Vec<(Connection, mpsc::UnboundedReceiver<Message>)>,
}

impl Game {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new());
        let coordinator = Coordinator::new(
            Arc::new(Level::default()),
            clock.clone(),
            &ServerConfig::default(),
        )
        .with_seed(42);
        Self {
            coordinator,
            clock,
            players: Vec::new(),
        }
    }

    fn join(&mut self, identity: &str) -> ConnectionId {
        let id = self.players.len() as ConnectionId;
        let (connection, receiver) = Connection::new(id);
        connection.set_ready_state(ReadyState::Open);
        self.coordinator
            .admit(PlayerSession::new(identity, connection.clone()));
        self.players.push((connection, receiver));
        id
    }

    fn tick(&mut self) {
        self.clock.advance(TICK);
        self.coordinator.round_robin();
    }

    fn renders(&mut self, player: usize) -> Vec<RenderData> {
        let mut renders = Vec::new();
        while let Ok(message) = self.players[player].1.try_recv() {
            if let Message::Text(text) = message {
                if let Ok(ServerMessage::Render(render)) = ServerMessage::from_json(&text) {
                    renders.push(render);
                }
            }
        }
        renders
    }
}

/// END-TO-END GAMES THROUGH THE COORDINATOR
mod game_tests {
    use super::*;

    /// Two queued sessions form one lobby with two slots
    #[test]
    fn queued_pair_forms_lobby() {
        let mut game = Game::new();
        game.join("alice");
        game.join("bob");

        let handle = game.coordinator.promote_queue().expect("lobby formed");
        let lobby = game.coordinator.lobby(handle).unwrap();
        assert_eq!(lobby.slots().len(), 2);
        assert_eq!(lobby.state(), LobbyState::Active);

        match game.players[1].1.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text, r#"{"message":"Player 1"}"#),
            other => panic!("Unexpected message {:?}", other),
        }
    }

    /// Holding right moves character 0 monotonically until a wall stops it
    #[test]
    fn holding_right_runs_into_the_wall() {
        let mut game = Game::new();
        let alice = game.join("alice");
        game.join("bob");
        let handle = game.coordinator.promote_queue().unwrap();
        game.coordinator
            .apply_input(alice, "alice", InputEvent::KeyDown(DirectionKey::Right));

        let mut last_x = f32::MIN;
        for _ in 0..2_500 {
            game.tick();
            let x = game.coordinator.lobby(handle).unwrap().simulation().characters()[0]
                .pos
                .x;
            assert!(x >= last_x);
            last_x = x;
        }

        let rendered = game.renders(0);
        let final_x = rendered.last().unwrap().player1.pos[0];
        assert!(final_x > 39.0 && final_x < 40.0);
        assert_eq!(rendered.last().unwrap().player1.facing, DirectionKey::Right.code());
    }

    /// A character within 0.5 of an uncollected gem collects it on the next tick
    #[test]
    fn gem_pickup_scores() {
        let mut game = Game::new();
        game.join("alice");
        game.join("bob");
        let handle = game.coordinator.promote_queue().unwrap();

        let lobby = game.coordinator.lobby_mut(handle).unwrap();
        let gem = lobby.simulation().gems()[3];
        let character = lobby.simulation_mut().character_mut(1).unwrap();
        character.pos = gem.pos;
        character.grounded = false;
        game.tick();

        let render = game.renders(0).pop().unwrap();
        assert!(render.gem(3).unwrap().collected);
        assert_eq!(render.player2.score, 1);
        assert_eq!(render.player1.score, 0);
    }

    /// Gem positions go out once, and again after a player rejoins
    #[test]
    fn gem_positions_resent_after_rejoin() {
        let mut game = Game::new();
        game.join("alice");
        game.join("bob");
        game.coordinator.promote_queue().unwrap();

        game.tick();
        game.tick();
        let first = game.renders(1);
        assert!(first[0].gem(0).unwrap().pos.is_some());
        assert!(first[1].gem(0).unwrap().pos.is_none());

        game.players[1].0.set_ready_state(ReadyState::Closed);
        game.join("bob");
        game.tick();
        let rejoined = game.renders(2);
        assert!(rejoined[0].gem(0).unwrap().pos.is_some());
    }

    /// A lobby with both slots gone dies after 10 s without delivery, then is pruned
    #[test]
    fn abandoned_lobby_dies_and_is_pruned() {
        let mut game = Game::new();
        game.join("alice");
        game.join("bob");
        let handle = game.coordinator.promote_queue().unwrap();
        game.tick();

        for (connection, _) in &game.players {
            connection.set_ready_state(ReadyState::Closed);
        }

        let mut elapsed = Duration::ZERO;
        while game
            .coordinator
            .lobby(handle)
            .is_some_and(|lobby| lobby.state() == LobbyState::Active)
        {
            game.tick();
            elapsed += TICK;
            assert!(elapsed <= Duration::from_millis(10_004));
        }
        assert!(elapsed >= Duration::from_millis(10_000));
        assert_eq!(
            game.coordinator.lobby(handle).map(|lobby| lobby.state()),
            Some(LobbyState::Dead)
        );

        game.tick();
        assert!(game.coordinator.lobby(handle).is_none());
        assert!(game.coordinator.route("alice").is_none());
    }

    /// One connected player keeps the lobby alive indefinitely
    #[test]
    fn lobby_with_one_player_stays_alive() {
        let mut game = Game::new();
        game.join("alice");
        game.join("bob");
        let handle = game.coordinator.promote_queue().unwrap();
        game.players[0].0.set_ready_state(ReadyState::Closed);

        for _ in 0..(15_000 / 4) {
            game.tick();
        }
        assert_eq!(
            game.coordinator.lobby(handle).map(|lobby| lobby.state()),
            Some(LobbyState::Active)
        );
    }

    /// Dead sessions in the queue never end up in a lobby
    #[test]
    fn queue_skips_disconnected_sessions() {
        let mut game = Game::new();
        game.join("alice");
        game.join("bob");
        game.join("carol");
        game.players[0].0.set_ready_state(ReadyState::Closed);

        let handle = game.coordinator.promote_queue().unwrap();
        let lobby = game.coordinator.lobby(handle).unwrap();
        assert_eq!(lobby.identities().collect::<Vec<_>>(), vec!["bob", "carol"]);
        assert!(game.coordinator.queue().is_empty());
    }
}

/// REAL WEBSOCKET SERVER
mod network_tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use server::network::Server;
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::http::StatusCode;
    use tokio_tungstenite::tungstenite::Error as WsError;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start_server() -> String {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            queue_interval: Duration::from_millis(20),
            ..ServerConfig::default()
        };
        let mut server = Server::bind(config, Arc::new(Level::default()))
            .await
            .expect("bind");
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr.to_string()
    }

    async fn next_message(socket: &mut Socket) -> ServerMessage {
        loop {
            let frame = timeout(WAIT, socket.next())
                .await
                .expect("timed out waiting for a message")
                .expect("socket closed")
                .expect("socket error");
            if let Message::Text(text) = frame {
                return ServerMessage::from_json(&text).expect("valid server message");
            }
        }
    }

    async fn login(addr: &str) -> String {
        let (mut socket, _) = connect_async(format!("ws://{}/login", addr))
            .await
            .expect("login connect");
        match next_message(&mut socket).await {
            ServerMessage::Credential(grant) => grant.token,
            other => panic!("Expected a credential, got {:?}", other),
        }
    }

    async fn play(addr: &str, token: &str) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}/play?token={}", addr, token))
            .await
            .expect("play connect");
        socket
    }

    async fn slot_of(socket: &mut Socket) -> usize {
        loop {
            if let ServerMessage::Slot(assignment) = next_message(socket).await {
                return assignment.slot().expect("slot index");
            }
        }
    }

    async fn next_render(socket: &mut Socket) -> RenderData {
        loop {
            if let ServerMessage::Render(render) = next_message(socket).await {
                return render;
            }
        }
    }

    #[tokio::test]
    async fn play_without_credential_is_refused() {
        let addr = start_server().await;
        match connect_async(format!("ws://{}/play", addr)).await {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED)
            }
            other => panic!("Expected HTTP 401, got {:?}", other.map(|_| ())),
        }
        let result = connect_async(format!("ws://{}/play?token=forged.token", addr)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn two_players_get_a_game() {
        let addr = start_server().await;
        let first_token = login(&addr).await;
        let second_token = login(&addr).await;
        assert_ne!(first_token, second_token);

        let mut first = play(&addr, &first_token).await;
        let mut second = play(&addr, &second_token).await;
        let first_slot = slot_of(&mut first).await;
        let second_slot = slot_of(&mut second).await;
        assert_eq!(first_slot + second_slot, 1);

        let opening = next_render(&mut first).await;
        assert!(opening.gem(0).unwrap().pos.is_some());
        let spawn_x = opening.player(first_slot).unwrap().pos[0];

        // Malformed control codes are ignored.
        first.send(Message::Text("XX".to_string())).await.unwrap();
        let right = InputEvent::KeyDown(DirectionKey::Right).encode();
        first.send(Message::Text(right.to_string())).await.unwrap();

        let moved = timeout(WAIT, async {
            loop {
                let render = next_render(&mut first).await;
                assert!(render.gem(0).unwrap().pos.is_none());
                let x = render.player(first_slot).unwrap().pos[0];
                if x > spawn_x + 1.0 {
                    return x;
                }
            }
        })
        .await
        .expect("character never moved");
        assert!(moved < 40.0);

        // The opponent sees the same world.
        timeout(WAIT, async {
            loop {
                let render = next_render(&mut second).await;
                if render.player(first_slot).unwrap().pos[0] > spawn_x + 1.0 {
                    break;
                }
            }
        })
        .await
        .expect("opponent never saw the move");
    }

    #[tokio::test]
    async fn live_duplicate_goes_back_to_matchmaking() {
        let addr = start_server().await;
        let first_token = login(&addr).await;
        let second_token = login(&addr).await;
        let third_token = login(&addr).await;

        let mut first = play(&addr, &first_token).await;
        let mut second = play(&addr, &second_token).await;
        slot_of(&mut first).await;
        slot_of(&mut second).await;

        // The seat is still held, so the same credential is queued again and
        // only gets a game once someone else shows up.
        let mut again = play(&addr, &first_token).await;
        let mut third = play(&addr, &third_token).await;
        assert_eq!(slot_of(&mut again).await + slot_of(&mut third).await, 1);

        // The original connection keeps playing in the first lobby.
        let render = next_render(&mut first).await;
        assert!(render.player1.pos[0] >= 0.0);
    }

    #[tokio::test]
    async fn reconnect_after_disconnect_takes_back_the_slot() {
        let addr = start_server().await;
        let first_token = login(&addr).await;
        let second_token = login(&addr).await;

        let mut first = play(&addr, &first_token).await;
        let mut second = play(&addr, &second_token).await;
        let slot = slot_of(&mut first).await;
        slot_of(&mut second).await;

        drop(first);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut again = play(&addr, &first_token).await;
        assert_eq!(slot_of(&mut again).await, slot);
        let render = next_render(&mut again).await;
        assert!(render.gem(0).unwrap().pos.is_some());
    }
}

/// WIRE FORMAT
mod protocol_tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn control_codes_decode() {
        let cases: [(&[u8], Option<InputEvent>); 6] = [
            (b"A0", Some(InputEvent::KeyDown(DirectionKey::Left))),
            (b"D1", Some(InputEvent::KeyUp(DirectionKey::Right))),
            (b" 0", Some(InputEvent::JumpPressed)),
            (b"W0", None),
            (b"A", None),
            (b"A0 ", None),
        ];
        for (data, expected) in cases {
            assert_eq!(InputEvent::parse(data), expected);
        }
    }

    #[test]
    fn render_data_shape() {
        let mut game = Game::new();
        game.join("alice");
        game.join("bob");
        game.coordinator.promote_queue().unwrap();
        game.tick();

        let (_, receiver) = &mut game.players[0];
        let mut texts = Vec::new();
        while let Ok(Message::Text(text)) = receiver.try_recv() {
            texts.push(text);
        }
        let value: serde_json::Value = serde_json::from_str(texts.last().unwrap()).unwrap();
        assert_eq!(value["message"], "renderData");
        assert_approx_eq!(value["time"].as_f64().unwrap(), 4.0);
        for key in ["player1", "player2"] {
            assert_eq!(value[key]["pos"].as_array().unwrap().len(), 3);
            assert!(value[key]["facing"].is_number());
            assert_eq!(value[key]["score"], 0);
        }
        for gem in 1..=10 {
            let key = format!("gem{}", gem);
            assert_eq!(value[&key]["collected"], false);
            assert!(value[&key]["pos"].is_array());
        }
        assert!(value.get("gem11").is_none());
    }

    #[test]
    fn server_messages_decode() {
        let slot = ServerMessage::from_json(r#"{"message":"Player 0"}"#).unwrap();
        assert!(matches!(slot, ServerMessage::Slot(ref s) if s.slot() == Some(0)));
        let grant = ServerMessage::from_json(r#"{"message":"credential","token":"abc"}"#).unwrap();
        assert!(matches!(grant, ServerMessage::Credential(ref g) if g.token == "abc"));
    }
}
