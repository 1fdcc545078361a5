//! Server network layer handling WebSocket connections and the tick timers.
//!
//! One event loop owns the [`Coordinator`]. Every accepted socket gets its own
//! task, which authenticates the upgrade request, reports the session and its
//! input to the loop over a channel, and forwards outbound frames from the
//! session's queue to the socket.

use crate::auth::{Authenticator, SignedTokenAuthenticator};
use crate::clock::{SharedClock, SystemClock};
use crate::config::ServerConfig;
use crate::coordinator::{Coordinator, ServerEvent};
use crate::error::{Result, ServerError};
use crate::level::Level;
use crate::session::{Connection, ConnectionId, PlayerSession, ReadyState};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{CredentialGrant, InputEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header, StatusCode};
use tokio_tungstenite::tungstenite::Message;

pub const LOGIN_PATH: &str = "/login";
pub const PLAY_PATH: &str = "/play";
pub const TOKEN_PARAM: &str = "token";
pub const AUTH_COOKIE: &str = "auth";

/// What an upgrade request is allowed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Receive a fresh credential, then disconnect.
    Login,
    /// Play as an authenticated identity.
    Play { identity: String },
}

/// Decides an upgrade request by path and credential. `None` means the
/// request must be refused.
pub fn admission(request: &Request, authenticator: &dyn Authenticator) -> Option<Admission> {
    match request.uri().path() {
        LOGIN_PATH => Some(Admission::Login),
        PLAY_PATH | "/" => {
            let token = query_token(request).or_else(|| cookie_token(request))?;
            let identity = authenticator.authenticate(&token)?;
            Some(Admission::Play { identity })
        }
        _ => None,
    }
}

fn query_token(request: &Request) -> Option<String> {
    request
        .uri()
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == TOKEN_PARAM)
        .map(|(_, value)| value.to_string())
}

fn cookie_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn unauthorized() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("Unauthorized".to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}

/// Main server coordinating networking and lobby scheduling
pub struct Server {
    listener: TcpListener,
    coordinator: Coordinator,
    authenticator: Arc<dyn Authenticator>,
    config: ServerConfig,
    next_connection_id: ConnectionId,

    // Communication channels
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn bind(config: ServerConfig, level: Arc<Level>) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let authenticator: Arc<dyn Authenticator> = match &config.secret {
            Some(secret) => Arc::new(SignedTokenAuthenticator::new(secret.clone())),
            None => Arc::new(SignedTokenAuthenticator::random()),
        };
        let clock: SharedClock = Arc::new(SystemClock::new());
        let coordinator = Coordinator::new(level, clock, &config);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            coordinator,
            authenticator,
            config,
            next_connection_id: 0,
            event_tx,
            event_rx,
        })
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        Arc::clone(&self.authenticator)
    }

    fn spawn_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;
        let authenticator = Arc::clone(&self.authenticator);
        let events = self.event_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, connection_id, authenticator, events).await
            {
                debug!("Connection {} from {} ended: {}", connection_id, addr, e);
            }
        });
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<()> {
        let mut queue_interval = interval(self.config.queue_interval);
        queue_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                },

                // Sessions and input from connection tasks
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.coordinator.handle_event(event),
                        None => return Err(ServerError::ChannelClosed),
                    }
                },

                _ = queue_interval.tick() => {
                    self.coordinator.promote_queue();
                },

                _ = tick_interval.tick() => {
                    self.coordinator.round_robin();
                },
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_id: ConnectionId,
    authenticator: Arc<dyn Authenticator>,
    events: mpsc::UnboundedSender<ServerEvent>,
) -> Result<()> {
    let mut granted = None;
    let callback = |request: &Request, response: Response| {
        match admission(request, authenticator.as_ref()) {
            Some(admission) => {
                granted = Some(admission);
                Ok(response)
            }
            None => {
                warn!("Refused upgrade to {} from {}", request.uri().path(), addr);
                Err(unauthorized())
            }
        }
    };
    let mut ws_stream = accept_hdr_async(stream, callback).await?;

    let identity = match granted {
        Some(Admission::Play { identity }) => identity,
        Some(Admission::Login) => {
            let credential = authenticator.issue();
            let grant = serde_json::to_string(&CredentialGrant::new(credential.token))?;
            ws_stream.send(Message::Text(grant)).await?;
            ws_stream.close(None).await?;
            return Ok(());
        }
        None => return Ok(()),
    };

    info!("{} connected from {} as connection {}", identity, addr, connection_id);
    let (connection, mut outbound) = Connection::new(connection_id);
    let (mut sink, mut source) = ws_stream.split();
    connection.set_ready_state(ReadyState::Open);
    events
        .send(ServerEvent::Admit(PlayerSession::new(
            identity.clone(),
            connection.clone(),
        )))
        .map_err(|_| ServerError::ChannelClosed)?;

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                debug!("Failed to send to connection {}: {}", connection_id, e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(frame) = source.next().await {
        let data = match frame {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Connection {} read error: {}", connection_id, e);
                break;
            }
        };
        match InputEvent::parse(&data) {
            Some(event) => {
                let input = ServerEvent::Input {
                    connection_id,
                    identity: identity.clone(),
                    event,
                };
                if events.send(input).is_err() {
                    break;
                }
            }
            None => debug!("Ignoring malformed input {:?} from {}", data, identity),
        }
    }

    connection.set_ready_state(ReadyState::Closed);
    writer.abort();
    info!("{} disconnected (connection {})", identity, connection_id);
    Ok(())
}
