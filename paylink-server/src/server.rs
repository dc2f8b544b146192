//! Engine surface and task orchestration.
//!
//! `Server` owns the listener and dispatcher tasks plus the shared engine
//! state. `connect` binds the transport and starts dispatching;
//! `disconnect` fails every outstanding request, closes all connections and
//! waits for their tasks before returning.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use paylink_core::{Address, Frame, FramePayload, Fulfill, Packet, Prepare, Reject, RejectCode};

use crate::account::{AccountId, AccountRegistry, AccountSnapshot};
use crate::config::ServerConfig;
use crate::connection::{spawn_connection, ConnectionCommand, ConnectionEvent};
use crate::error::{ServerError, ServerResult};
use crate::handler::{MessageHandler, PrepareHandler};
use crate::pending::PendingTable;
use crate::reject::reject_for;
use crate::router::Router;

/// Capacity of the dispatcher's event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long to wait for connection tasks during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Shared engine state, used by the dispatcher and all flows.
pub(crate) struct Engine {
    /// Server configuration.
    pub(crate) config: ServerConfig,
    /// Account records; sole owner of auth state.
    pub(crate) registry: Arc<AccountRegistry>,
    /// Routing decisions over the registry.
    pub(crate) router: Router,
    /// In-flight outbound requests.
    pub(crate) pending: Arc<PendingTable>,
    /// Outbound command sender per live connection.
    pub(crate) connections: RwLock<HashMap<AccountId, mpsc::UnboundedSender<ConnectionCommand>>>,
    /// Connection task handles, for graceful shutdown.
    pub(crate) tasks: Mutex<HashMap<AccountId, JoinHandle<()>>>,
    /// Handler for locally-addressed prepares.
    pub(crate) prepare_handler: Arc<dyn PrepareHandler>,
    /// Optional settlement hook for sub-protocol messages.
    pub(crate) message_handler: Option<Arc<dyn MessageHandler>>,
    /// Connection handle counter; never reused within a server's lifetime.
    next_account_id: AtomicU64,
}

impl Engine {
    fn new(
        config: ServerConfig,
        prepare_handler: Arc<dyn PrepareHandler>,
        message_handler: Option<Arc<dyn MessageHandler>>,
    ) -> Self {
        let registry = Arc::new(AccountRegistry::new(config.address.clone()));
        let router = Router::new(registry.clone());

        Self {
            config,
            registry,
            router,
            pending: Arc::new(PendingTable::new()),
            connections: RwLock::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            prepare_handler,
            message_handler,
            next_account_id: AtomicU64::new(1),
        }
    }

    /// The server's own address.
    pub(crate) fn server_address(&self) -> &Address {
        self.registry.server_address()
    }

    /// Queue a frame for an account's connection. Never blocks.
    pub(crate) fn send_frame(&self, account: AccountId, frame: Frame) -> ServerResult<()> {
        let connections = self.connections.read();
        let tx = connections
            .get(&account)
            .ok_or(ServerError::AccountNotFound(account))?;

        tx.send(ConnectionCommand::Send(frame))
            .map_err(|_| ServerError::Transport("connection task gone".to_string()))
    }

    /// Answer a request with a transfer-level error frame.
    pub(crate) fn send_error_frame(
        &self,
        account: AccountId,
        request_id: u32,
        code: RejectCode,
        message: &str,
    ) {
        let frame = Frame::new(
            request_id,
            FramePayload::Error(paylink_core::ProtocolError {
                code: code.code().to_string(),
                message: message.to_string(),
            }),
        );
        if let Err(e) = self.send_frame(account, frame) {
            tracing::debug!(account = %account, error = %e, "failed to send error frame");
        }
    }

    /// Ask a connection's task to flush and close.
    pub(crate) fn close_connection(&self, account: AccountId) {
        if let Some(tx) = self.connections.read().get(&account) {
            let _ = tx.send(ConnectionCommand::Close);
        }
    }

    /// Register an accepted socket and spawn its connection task.
    fn accept_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
        event_tx: &mpsc::Sender<ConnectionEvent>,
    ) {
        if self.registry.len() >= self.config.max_accounts {
            tracing::debug!(addr = %addr, "rejecting connection: account limit reached");
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "failed to set TCP_NODELAY");
        }

        let id = AccountId::new(self.next_account_id.fetch_add(1, Ordering::Relaxed));
        self.registry.insert(id, addr);

        let (command_tx, handle) = spawn_connection(id, addr, stream, event_tx.clone());
        self.connections.write().insert(id, command_tx);
        self.tasks.lock().insert(id, handle);
        tracing::debug!(account = %id, addr = %addr, "accepted connection");

        // A connection that stays unauthenticated past the budget is closed.
        let engine = Arc::downgrade(self);
        let auth_timeout = self.config.auth_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(auth_timeout).await;
            if let Some(engine) = engine.upgrade() {
                if engine
                    .registry
                    .state(id)
                    .is_some_and(|state| state.is_pending_auth())
                {
                    tracing::debug!(account = %id, "auth timeout, closing connection");
                    engine.close_connection(id);
                }
            }
        });
    }
}

/// The account connection and packet routing engine.
pub struct Server {
    engine: Arc<Engine>,
    shutdown_tx: broadcast::Sender<()>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
    dispatcher_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    /// Create a server with the given configuration and local handler.
    pub fn new(config: ServerConfig, prepare_handler: Arc<dyn PrepareHandler>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            engine: Arc::new(Engine::new(config, prepare_handler, None)),
            shutdown_tx,
            listener_task: Mutex::new(None),
            dispatcher_task: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Create a server with a settlement hook installed.
    pub fn with_message_handler(
        config: ServerConfig,
        prepare_handler: Arc<dyn PrepareHandler>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            engine: Arc::new(Engine::new(config, prepare_handler, Some(message_handler))),
            shutdown_tx,
            listener_task: Mutex::new(None),
            dispatcher_task: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Bind the transport and start accepting and dispatching.
    pub async fn connect(&self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.engine.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(local_addr);

        tracing::info!(
            addr = %local_addr,
            address = %self.engine.server_address(),
            "server listening"
        );

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let listener_task = tokio::spawn(run_listener(
            self.engine.clone(),
            listener,
            event_tx,
            self.shutdown_tx.subscribe(),
        ));
        let dispatcher_task = tokio::spawn(run_dispatcher(self.engine.clone(), event_rx));

        *self.listener_task.lock() = Some(listener_task);
        *self.dispatcher_task.lock() = Some(dispatcher_task);

        Ok(())
    }

    /// Stop the listener, fail all pending requests, and close every
    /// connection before returning.
    pub async fn disconnect(&self) {
        tracing::info!("server shutting down");
        let _ = self.shutdown_tx.send(());

        let failed = self.engine.pending.fail_all(|| ServerError::Disconnected);
        if failed > 0 {
            tracing::debug!(failed, "failed outstanding requests on shutdown");
        }

        let accounts: Vec<AccountId> = self.engine.connections.read().keys().copied().collect();
        for account in accounts {
            self.engine.close_connection(account);
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.engine.tasks.lock();
            tasks.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }

        let listener = self.listener_task.lock().take();
        if let Some(handle) = listener {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }
        let dispatcher = self.dispatcher_task.lock().take();
        if let Some(handle) = dispatcher {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }

        self.engine.connections.write().clear();
        self.engine.registry.clear();
    }

    /// Send a payment packet from the local side.
    ///
    /// Routing follows the destination address unless an explicit override
    /// names an account, in which case the override is authoritative. Every
    /// failure surfaces as a rejection packet.
    pub async fn send_packet(
        &self,
        prepare: Prepare,
        explicit_override: Option<Address>,
    ) -> Result<Fulfill, Reject> {
        let result = self
            .engine
            .execute_prepare(prepare, explicit_override.as_ref())
            .await;

        match result {
            Ok(Packet::Fulfill(fulfill)) => Ok(fulfill),
            Ok(Packet::Reject(reject)) => Err(reject),
            Ok(Packet::Prepare(_)) => Err(reject_for(
                &ServerError::Transport("peer answered with a prepare".to_string()),
                self.engine.server_address(),
            )),
            Err(e) => Err(reject_for(&e, self.engine.server_address())),
        }
    }

    /// The server's own address.
    pub fn address(&self) -> &Address {
        self.engine.server_address()
    }

    /// The bound socket address, once `connect` has succeeded.
    ///
    /// Useful for tests binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Snapshot all registered connections.
    pub fn accounts(&self) -> Vec<AccountSnapshot> {
        self.engine.registry.snapshots()
    }

    /// Number of in-flight outbound requests.
    pub fn pending_requests(&self) -> usize {
        self.engine.pending.len()
    }
}

/// Accept loop. Ends on shutdown signal.
async fn run_listener(
    engine: Arc<Engine>,
    listener: TcpListener,
    event_tx: mpsc::Sender<ConnectionEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::debug!("listener shutting down");
                break;
            }

            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    engine.accept_connection(stream, addr, &event_tx);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                }
            }
        }
    }
}

/// Event loop. Ends when the listener and every connection task have
/// dropped their event senders.
async fn run_dispatcher(engine: Arc<Engine>, mut event_rx: mpsc::Receiver<ConnectionEvent>) {
    while let Some(event) = event_rx.recv().await {
        engine.handle_event(event).await;
    }
    tracing::debug!("dispatcher stopped");
}
