//! src/session.rs
//!
//! WebSocket transport and connection supervision. One supervisor per module
//! instance; at most one connection loop runs at a time. Each successful
//! handshake bumps the store generation so writes queued by a superseded
//! connection are discarded rather than applied late.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use obslink_common::models::config::ModuleConfig;
use obslink_common::traits::HostSurface;
use obslink_common::ConnectionStatus;
use obslink_protocol::auth::authentication_string;
use obslink_protocol::close_code::CloseCode;
use obslink_protocol::message::{ClientMessage, Identify, ServerMessage};
use obslink_protocol::subscription::EventSubscription;
use obslink_protocol::RPC_VERSION;

use crate::bootstrap;
use crate::error::{ErrorClass, ObsLinkError, Result};
use crate::gateway::Gateway;
use crate::listeners::EventListenerBank;
use crate::polls::PollLoops;
use crate::store::SharedStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RETRY_DELAY: Duration = Duration::from_secs(5);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const OUTBOUND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

/// Why a live connection ended.
enum SessionEnd {
    /// Operator asked us to stop.
    Shutdown,
    /// The server announced it is exiting; treated like a transient drop so
    /// we keep retrying until OBS comes back.
    ExitStarted,
}

pub struct SessionSupervisor {
    config: RwLock<ModuleConfig>,
    store: SharedStore,
    host: Arc<dyn HostSurface>,
    polls: Arc<PollLoops>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    gateway: RwLock<Option<Arc<Gateway>>>,
}

impl SessionSupervisor {
    pub fn new(
        config: ModuleConfig,
        store: SharedStore,
        host: Arc<dyn HostSurface>,
        polls: Arc<PollLoops>,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            config: RwLock::new(config),
            store,
            host,
            polls,
            running: AtomicBool::new(false),
            shutdown,
            gateway: RwLock::new(None),
        })
    }

    /// The gateway for the current connection, if one is live.
    pub async fn gateway(&self) -> Option<Arc<Gateway>> {
        self.gateway.read().await.clone()
    }

    pub async fn set_config(&self, config: ModuleConfig) {
        *self.config.write().await = config;
    }

    /// Spawns the reconnect loop. A second call while a loop is already
    /// running is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("[Session] start ignored, supervisor already running");
            return;
        }
        let _ = self.shutdown.send(false);
        let this = self.clone();
        tokio::spawn(async move {
            this.run().await;
            this.running.store(false, Ordering::SeqCst);
        });
    }

    /// Tears down the current connection (if any) and stops the reconnect
    /// loop. Safe to call repeatedly.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        self.polls.stop_all();
        if let Some(gateway) = self.gateway.write().await.take() {
            gateway.abort_pending();
        }
        self.host
            .update_status(ConnectionStatus::Disconnected, None)
            .await;
    }

    async fn run(self: &Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            if *shutdown_rx.borrow() {
                return;
            }
            self.host
                .update_status(ConnectionStatus::Connecting, None)
                .await;

            match self.connect_once(&mut shutdown_rx).await {
                Ok(SessionEnd::Shutdown) => return,
                Ok(SessionEnd::ExitStarted) => {
                    info!("[Session] OBS is shutting down, will retry");
                    self.teardown_connection().await;
                }
                Err(e) => {
                    self.teardown_connection().await;
                    if e.class() == ErrorClass::Fatal {
                        error!("[Session] fatal: {}", e);
                        self.host
                            .update_status(ConnectionStatus::Error(e.to_string()), Some(e.to_string()))
                            .await;
                        return;
                    }
                    warn!("[Session] connection ended: {}", e);
                }
            }

            self.host
                .update_status(ConnectionStatus::Reconnecting, None)
                .await;
            tokio::select! {
                _ = sleep(RETRY_DELAY) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return;
                    }
                }
            }
        }
    }

    async fn teardown_connection(&self) {
        self.polls.stop_all();
        if let Some(gateway) = self.gateway.write().await.take() {
            gateway.abort_pending();
        }
    }

    /// One full connection lifetime: dial, handshake, serve until the socket
    /// dies or we are told to stop.
    async fn connect_once(
        self: &Arc<Self>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd> {
        let config = self.config.read().await.clone();
        let url = config.url();
        info!("[Session] connecting to {}", url);

        let (mut ws, _) = connect_async(&url)
            .await
            .map_err(|e| ObsLinkError::WebSocket(e.to_string()))?;

        let identified = timeout(HANDSHAKE_TIMEOUT, handshake(&mut ws, &config))
            .await
            .map_err(|_| ObsLinkError::Handshake("handshake timed out".into()))??;
        info!(
            "[Session] identified, negotiated rpc version {}",
            identified
        );

        let generation = self.store.write().await.begin_generation();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
        let gateway = Gateway::new(outbound_tx, self.store.clone());
        *self.gateway.write().await = Some(gateway.clone());

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let bank = EventListenerBank::new(
            self.store.clone(),
            self.host.clone(),
            gateway.clone(),
            self.polls.clone(),
            generation,
        );
        let listener_task = tokio::spawn(bank.run(event_rx));

        let (mut write, mut read) = ws.split();
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(frame.into())).await {
                    debug!("[Session] write failed: {}", e);
                    break;
                }
            }
        });

        // Bootstrap runs concurrently with the read loop (its responses come
        // back through it); a stage-1 failure is reported on the fault
        // channel and ends the connection.
        let (fault_tx, mut fault_rx) = mpsc::channel::<ObsLinkError>(1);
        let bootstrap_task = {
            let gateway = gateway.clone();
            let store = self.store.clone();
            let polls = self.polls.clone();
            tokio::spawn(async move {
                if let Err(e) = bootstrap::run(&gateway, &store, &polls, generation).await {
                    let _ = fault_tx.send(e).await;
                }
            })
        };

        self.host
            .update_status(ConnectionStatus::Connected, None)
            .await;

        let outcome = loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break Ok(SessionEnd::Shutdown);
                    }
                }
                Some(fault) = fault_rx.recv() => {
                    break Err(fault);
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(txt))) => {
                            match route_frame(&txt, &gateway, &event_tx).await {
                                Ok(RouteOutcome::Continue) => {}
                                Ok(RouteOutcome::ExitStarted) => break Ok(SessionEnd::ExitStarted),
                                Err(e) => break Err(e),
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break Err(match frame {
                                Some(f) => ObsLinkError::from_close_code(
                                    CloseCode::from_u16(f.code.into()),
                                    f.reason.to_string(),
                                ),
                                None => ObsLinkError::ConnectionClosed("closed without code".into()),
                            });
                        }
                        Some(Ok(_)) => {} // ping/pong/binary
                        Some(Err(e)) => break Err(ObsLinkError::WebSocket(e.to_string())),
                        None => break Err(ObsLinkError::ConnectionClosed("socket ended".into())),
                    }
                }
            }
        };

        bootstrap_task.abort();
        writer_task.abort();
        drop(event_tx);
        listener_task.abort();
        outcome
    }
}

/// Hello → Identify → Identified. Returns the negotiated rpc version.
async fn handshake(ws: &mut WsStream, config: &ModuleConfig) -> Result<u32> {
    let hello = loop {
        match next_server_message(ws).await? {
            ServerMessage::Hello(hello) => break hello,
            other => debug!("[Session] pre-hello frame ignored: {:?}", other),
        }
    };

    let authentication = match &hello.authentication {
        Some(auth) => {
            let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) else {
                return Err(ObsLinkError::MissingCredential);
            };
            Some(authentication_string(password, &auth.salt, &auth.challenge))
        }
        None => None,
    };

    let identify = ClientMessage::Identify(Identify {
        rpc_version: RPC_VERSION,
        authentication,
        event_subscriptions: EventSubscription::module_mask(),
    });
    let frame = identify
        .to_frame()
        .map_err(|e| ObsLinkError::Handshake(e.to_string()))?;
    ws.send(Message::Text(frame.into()))
        .await
        .map_err(|e| ObsLinkError::WebSocket(e.to_string()))?;

    loop {
        match next_server_message(ws).await? {
            ServerMessage::Identified(identified) => {
                return Ok(identified.negotiated_rpc_version);
            }
            other => debug!("[Session] pre-identified frame ignored: {:?}", other),
        }
    }
}

/// Reads frames until a parseable protocol message arrives. A close frame
/// here is mapped through the close-code taxonomy, which is how a bad
/// password (4009) and an rpc-version mismatch (4010) surface as fatal.
async fn next_server_message(ws: &mut WsStream) -> Result<ServerMessage> {
    while let Some(msg) = ws.next().await {
        let msg = msg.map_err(|e| ObsLinkError::WebSocket(e.to_string()))?;
        match msg {
            Message::Text(txt) => {
                return ServerMessage::parse(&txt)
                    .map_err(|e| ObsLinkError::Handshake(e.to_string()));
            }
            Message::Close(frame) => {
                return Err(match frame {
                    Some(f) => ObsLinkError::from_close_code(
                        CloseCode::from_u16(f.code.into()),
                        f.reason.to_string(),
                    ),
                    None => ObsLinkError::ConnectionClosed("closed during handshake".into()),
                });
            }
            _ => continue,
        }
    }
    Err(ObsLinkError::ConnectionClosed(
        "socket ended during handshake".into(),
    ))
}

enum RouteOutcome {
    Continue,
    ExitStarted,
}

async fn route_frame(
    txt: &str,
    gateway: &Arc<Gateway>,
    event_tx: &mpsc::Sender<obslink_protocol::message::Event>,
) -> Result<RouteOutcome> {
    match ServerMessage::parse(txt) {
        Ok(ServerMessage::RequestResponse(resp)) => gateway.complete(resp),
        Ok(ServerMessage::RequestBatchResponse(resp)) => gateway.complete_batch(resp),
        Ok(ServerMessage::Event(event)) => {
            if event.event_type == "ExitStarted" {
                return Ok(RouteOutcome::ExitStarted);
            }
            if event_tx.send(event).await.is_err() {
                debug!("[Session] listener bank gone, dropping event");
            }
        }
        Ok(ServerMessage::Hello(_)) | Ok(ServerMessage::Identified(_)) => {
            debug!("[Session] unexpected handshake frame mid-session");
        }
        Ok(ServerMessage::Unknown { op, .. }) => {
            debug!("[Session] unknown opcode {}", op);
        }
        Err(e) => warn!("[Session] unparseable frame: {}", e),
    }
    Ok(RouteOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use obslink_common::traits::NullHost;
    use crate::store;

    fn supervisor() -> Arc<SessionSupervisor> {
        SessionSupervisor::new(
            ModuleConfig {
                host: "127.0.0.1".into(),
                // nothing listens here; every attempt fails fast
                port: 1,
                password: None,
            },
            store::shared(),
            Arc::new(NullHost),
            Arc::new(PollLoops::new()),
        )
    }

    #[tokio::test]
    async fn start_twice_runs_a_single_loop() {
        let sup = supervisor();
        sup.start();
        sup.start();
        assert!(sup.running.load(Ordering::SeqCst));
        sup.stop().await;
    }

    #[tokio::test]
    async fn stop_clears_gateway_and_is_idempotent() {
        let sup = supervisor();
        {
            let (tx, _rx) = mpsc::channel(4);
            *sup.gateway.write().await = Some(Gateway::new(tx, sup.store.clone()));
        }
        sup.stop().await;
        assert!(sup.gateway().await.is_none());
        sup.stop().await;
    }

    #[tokio::test]
    async fn route_frame_forwards_events_and_flags_exit() {
        let store = store::shared();
        let (tx, _out) = mpsc::channel(4);
        let gateway = Gateway::new(tx, store);
        let (event_tx, mut event_rx) = mpsc::channel(4);

        let frame = r#"{"op":5,"d":{"eventType":"InputMuteStateChanged","eventIntent":8,"eventData":{}}}"#;
        let outcome = route_frame(frame, &gateway, &event_tx).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::Continue));
        assert_eq!(
            event_rx.recv().await.unwrap().event_type,
            "InputMuteStateChanged"
        );

        let exit = r#"{"op":5,"d":{"eventType":"ExitStarted","eventIntent":1}}"#;
        let outcome = route_frame(exit, &gateway, &event_tx).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::ExitStarted));
    }

    #[tokio::test]
    async fn unknown_opcode_is_not_an_error() {
        let store = store::shared();
        let (tx, _out) = mpsc::channel(4);
        let gateway = Gateway::new(tx, store);
        let (event_tx, _event_rx) = mpsc::channel(4);

        let frame = r#"{"op":42,"d":{"anything":true}}"#;
        let outcome = route_frame(frame, &gateway, &event_tx).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::Continue));
    }
}
