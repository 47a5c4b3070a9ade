//! WebSocket Game Host
//!
//! Accepts browser connections, authenticates them with the identity
//! provider's ID token and binds each connection to at most one game
//! session. Frames, events and results from the session task are forwarded
//! to the socket as they are published.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::games::GameError;
use crate::network::auth::{validate_token, AuthConfig, AuthError, TokenClaims};
use crate::network::protocol::{
    AuthResult, ClientMessage, ErrorCode, OpenRequest, ServerMessage,
};
use crate::network::session::{
    Control, RuntimeError, ScoreRecorder, SessionHandle, SessionId, SessionManager,
};
use crate::portal::profile::{ProfileContext, UserProfile};
use crate::portal::store::{InsertUser, MemStorage, StoreError, User, UserId, UserUpdate};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);
const OUTBOUND_BUFFER: usize = 64;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Reject `open` until the connection has authenticated.
    pub require_auth: bool,
    pub auth: AuthConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            require_auth: false,
            auth: AuthConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connected client bookkeeping.
struct ConnectedClient {
    uid: Option<String>,
    session_id: Option<SessionId>,
    #[allow(dead_code)]
    connected_at: Instant,
}

/// The game host.
pub struct GameServer {
    config: Arc<ServerConfig>,
    sessions: Arc<SessionManager>,
    store: Arc<MemStorage>,
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Cached profile of the last player to sign in on this host.
    profile: Option<Arc<Mutex<ProfileContext>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server backed by `store`.
    pub fn new(config: ServerConfig, store: Arc<MemStorage>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        if config.require_auth && !config.auth.is_configured() {
            warn!("Authentication required but no key configured; every open will be rejected");
        }

        Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionManager::new()),
            store,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            profile: None,
            shutdown_tx,
        }
    }

    /// Keep `profile` in step with sign-ins, avatar changes and logouts.
    pub fn with_profile(mut self, profile: ProfileContext) -> Self {
        self.profile = Some(Arc::new(Mutex::new(profile)));
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self), fields(addr = %self.config.bind_addr))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game host listening on {}", listener.local_addr()?);

        let cleanup_sessions = self.sessions.clone();
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_sessions).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);
        let mut conn = Connection::new(
            addr,
            self.config.clone(),
            self.sessions.clone(),
            self.store.clone(),
            msg_tx.clone(),
        );
        conn.profile = self.profile.clone();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();

            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    uid: None,
                    session_id: None,
                    connected_at: Instant::now(),
                });
            }

            // Outbound: serialize and write in order
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        conn.reply(ServerMessage::error(
                                            ErrorCode::InvalidMessage,
                                            "Invalid message format",
                                        )).await;
                                        continue;
                                    }
                                };

                                conn.handle(client_msg).await;

                                let mut clients = clients.write().await;
                                if let Some(client) = clients.get_mut(&addr) {
                                    client.uid = conn.uid().map(str::to_string);
                                    client.session_id = conn.session_id();
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                conn.reply(ServerMessage::error(
                                    ErrorCode::InvalidMessage,
                                    "Binary frames are not supported",
                                )).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            // tungstenite answers pings itself
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        conn.reply(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            conn.close_session().await;
            // Let queued messages drain before the writer stops
            drop(conn);
            drop(msg_tx);
            let _ = sender_task.await;

            clients.write().await.remove(&addr);
            info!("Client {} cleaned up", addr);
        });
    }

    /// Periodically forget sessions whose task has exited.
    async fn run_cleanup_loop(sessions: Arc<SessionManager>) {
        let mut ticker = interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            sessions.cleanup().await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Connections that have authenticated.
    pub async fn authenticated_count(&self) -> usize {
        self.clients.read().await.values().filter(|c| c.uid.is_some()).count()
    }

    /// Connections with a game open.
    pub async fn playing_count(&self) -> usize {
        self.clients.read().await.values().filter(|c| c.session_id.is_some()).count()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Signed-in player behind a connection.
#[derive(Clone, Debug)]
struct Identity {
    uid: String,
    /// Store user, when the token carried enough to provision one.
    user: Option<(UserId, String)>,
}

impl Identity {
    fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|(id, _)| *id)
    }
}

/// Per-connection state: identity plus the one open session.
struct Connection {
    addr: SocketAddr,
    config: Arc<ServerConfig>,
    sessions: Arc<SessionManager>,
    store: Arc<MemStorage>,
    profile: Option<Arc<Mutex<ProfileContext>>>,
    sender: mpsc::Sender<ServerMessage>,
    identity: Option<Identity>,
    session: Option<SessionHandle>,
    forwarder: Option<JoinHandle<()>>,
}

impl Connection {
    fn new(
        addr: SocketAddr,
        config: Arc<ServerConfig>,
        sessions: Arc<SessionManager>,
        store: Arc<MemStorage>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            addr,
            config,
            sessions,
            store,
            profile: None,
            sender,
            identity: None,
            session: None,
            forwarder: None,
        }
    }

    fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.uid.as_str())
    }

    fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(SessionHandle::id)
    }

    async fn reply(&self, msg: ServerMessage) {
        let _ = self.sender.send(msg).await;
    }

    async fn handle(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::Auth { token } => self.handle_auth(&token).await,
            ClientMessage::Open(req) => self.handle_open(req).await,
            ClientMessage::Input { event } => {
                let Some(session) = &self.session else {
                    return self.no_session().await;
                };
                if let Err(e) = session.input(event).await {
                    self.runtime_error(e).await;
                }
            }
            ClientMessage::Start => self.handle_control(Control::Start).await,
            ClientMessage::Pause => self.handle_control(Control::Pause).await,
            ClientMessage::Resume => self.handle_control(Control::Resume).await,
            ClientMessage::Restart => self.handle_control(Control::Restart).await,
            ClientMessage::Close => self.close_session().await,
            ClientMessage::SetAvatar { avatar } => self.handle_set_avatar(avatar).await,
            ClientMessage::Logout => self.handle_logout().await,
            ClientMessage::Ping { timestamp } => {
                self.reply(ServerMessage::Pong {
                    timestamp,
                    server_time: unix_millis(),
                })
                .await;
            }
        }
    }

    async fn handle_auth(&mut self, token: &str) {
        let claims = match validate_token(token, &self.config.auth) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(addr = %self.addr, error = %e, "Authentication failed");
                let code = match e {
                    AuthError::Expired => ErrorCode::TokenExpired,
                    AuthError::NotConfigured => ErrorCode::AuthFailed,
                    _ => ErrorCode::InvalidToken,
                };
                self.reply(ServerMessage::AuthResult(AuthResult {
                    success: false,
                    uid: None,
                    error: Some(e.to_string()),
                    server_version: self.config.version.clone(),
                }))
                .await;
                self.reply(ServerMessage::error(code, e.to_string())).await;
                return;
            }
        };

        let user = match provision_user(&self.store, &claims).await {
            Ok(user) => user,
            Err(e) => {
                warn!(uid = %claims.fingerprint(), error = %e, "Could not provision user; scores will not be kept");
                None
            }
        };

        let user_id = user.as_ref().map(|u| u.id);
        info!(addr = %self.addr, uid = %claims.fingerprint(), ?user_id, "Client authenticated");
        self.identity = Some(Identity {
            uid: claims.sub.clone(),
            user: user.as_ref().map(|u| (u.id, u.email.clone())),
        });
        self.reply(ServerMessage::AuthResult(AuthResult {
            success: true,
            uid: Some(claims.sub),
            error: None,
            server_version: self.config.version.clone(),
        }))
        .await;

        if let Some(user) = user {
            let profile = UserProfile::from(&user);
            if let Some(ctx) = &self.profile {
                if let Err(e) = ctx.lock().await.set_profile(profile.clone()) {
                    warn!(error = %e, "Failed to save profile");
                }
            }
            self.reply(ServerMessage::Profile(profile)).await;
        }
    }

    async fn handle_set_avatar(&mut self, avatar: u32) {
        let Some(user_id) = self.identity.as_ref().and_then(Identity::user_id) else {
            self.reply(ServerMessage::error(ErrorCode::Unauthorized, "No signed-in user"))
                .await;
            return;
        };

        let update = UserUpdate {
            avatar: Some(avatar),
            ..Default::default()
        };
        let user = match self.store.update_user(user_id, update).await {
            Ok(user) => user,
            Err(e) => {
                let code = match e {
                    StoreError::Validation(_) => ErrorCode::InvalidMessage,
                    _ => ErrorCode::InternalError,
                };
                self.reply(ServerMessage::error(code, e.to_string())).await;
                return;
            }
        };

        if let Some(ctx) = &self.profile {
            let mut ctx = ctx.lock().await;
            let cached = ctx.profile().is_some_and(|p| p.email == user.email);
            let saved = if cached {
                ctx.update_avatar(avatar).map(|_| ())
            } else {
                ctx.set_profile(UserProfile::from(&user))
            };
            if let Err(e) = saved {
                warn!(error = %e, "Failed to save profile");
            }
        }
        debug!(addr = %self.addr, user_id, avatar, "Avatar changed");
        self.reply(ServerMessage::Profile(UserProfile::from(&user))).await;
    }

    /// Sign out. The cached profile is cleared only if it is this player's.
    async fn handle_logout(&mut self) {
        self.close_session().await;

        if let Some(identity) = self.identity.take() {
            info!(addr = %self.addr, user_id = ?identity.user_id(), "Client logged out");
            if let (Some(ctx), Some((_, email))) = (&self.profile, &identity.user) {
                let mut ctx = ctx.lock().await;
                if ctx.profile().is_some_and(|p| &p.email == email) {
                    if let Err(e) = ctx.clear() {
                        warn!(error = %e, "Failed to clear profile");
                    }
                }
            }
        }
        self.reply(ServerMessage::LoggedOut).await;
    }

    async fn handle_open(&mut self, req: OpenRequest) {
        if self.config.require_auth && self.identity.is_none() {
            self.reply(ServerMessage::error(ErrorCode::Unauthorized, "Must authenticate first"))
                .await;
            return;
        }

        self.close_session().await;

        let recorder = self
            .identity
            .as_ref()
            .and_then(Identity::user_id)
            .map(|user_id| ScoreRecorder::new(self.store.clone(), user_id));

        let handle = match self.sessions.open(req.game, &req.options, recorder).await {
            Ok(handle) => handle,
            Err(e) => {
                let code = match e {
                    GameError::UnknownGame(_) => ErrorCode::UnknownGame,
                    GameError::InvalidMode { .. } => ErrorCode::InvalidMode,
                };
                self.reply(ServerMessage::error(code, e.to_string())).await;
                return;
            }
        };

        self.reply(ServerMessage::Opened(handle.opened_info())).await;
        self.forwarder = Some(forward_updates(&handle, self.sender.clone()));
        if let Err(e) = handle.redraw().await {
            self.runtime_error(e).await;
        }
        self.session = Some(handle);
    }

    async fn handle_control(&mut self, control: Control) {
        let Some(session) = &self.session else {
            return self.no_session().await;
        };
        match session.control(control).await {
            Ok(phase) => debug!(addr = %self.addr, ?control, %phase, "Lifecycle applied"),
            Err(e) => self.runtime_error(e).await,
        }
    }

    /// Close the open session, if any.
    async fn close_session(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(session) = self.session.take() {
            self.sessions.close(&session.id()).await;
        }
    }

    async fn no_session(&self) {
        self.reply(ServerMessage::error(ErrorCode::NoSession, "No game is open")).await;
    }

    async fn runtime_error(&mut self, e: RuntimeError) {
        match e {
            RuntimeError::Session(e) => {
                self.reply(ServerMessage::error(ErrorCode::InvalidTransition, e.to_string()))
                    .await;
            }
            RuntimeError::Closed(id) => {
                warn!(session = %hex::encode(id.as_bytes()), "Session task gone");
                self.session = None;
                self.no_session().await;
            }
        }
    }
}

/// Copy session updates into the connection's outbound queue.
fn forward_updates(handle: &SessionHandle, sender: mpsc::Sender<ServerMessage>) -> JoinHandle<()> {
    let mut updates = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(msg) => {
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Slow client, updates dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Find or create the store user for a validated token.
///
/// Matches on provider uid first, then links an existing user with the same
/// email if that user has no provider uid yet. Tokens without an email claim,
/// or whose email belongs to a user linked elsewhere, get no user.
pub async fn provision_user(
    store: &MemStorage,
    claims: &TokenClaims,
) -> Result<Option<User>, StoreError> {
    if let Some(user) = store.get_user_by_firebase_uid(claims.uid()).await {
        return Ok(Some(user));
    }

    let Some(email) = claims.email.as_deref() else {
        return Ok(None);
    };

    if let Some(user) = store.get_user_by_email(email).await {
        if user.firebase_uid.is_some() {
            warn!(
                uid = %claims.fingerprint(),
                user_id = user.id,
                "Email belongs to a user linked to another identity; not linking"
            );
            return Ok(None);
        }
        let update = UserUpdate {
            firebase_uid: Some(claims.uid().to_string()),
            ..Default::default()
        };
        return store.update_user(user.id, update).await.map(Some);
    }

    let first_name = email.split_once('@').map_or(email, |(local, _)| local);
    store
        .create_user(InsertUser {
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: String::new(),
            firebase_uid: Some(claims.uid().to_string()),
            ..Default::default()
        })
        .await
        .map(Some)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// =============================================================================
// TESTS
// =============================================================================
