//! Websocket link between a [`LiveStateStore`] and the session relay.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::mpsc::{self, error::TryRecvError},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{ClientError, ClientResult, store::LiveStateStore};
use crate::dto::ws::{ClientMessage, ServerMessage};

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_ATTEMPTS: u32 = 10;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where and how persistently to reach the relay.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Websocket endpoint, e.g. `ws://host:8080/ws`.
    pub url: String,
    /// Pause between connection attempts.
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: u32,
}

impl TransportConfig {
    /// Default reconnect policy for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

enum Exit {
    Shutdown,
    Disconnected,
}

/// Drives the websocket for one store: joins the session group on every
/// (re)connect, forwards the store's outbound messages and feeds relayed
/// messages back into the store.
///
/// Messages produced while disconnected are dropped when the link comes back.
/// The transport stops once the store is dropped.
pub struct SyncTransport {
    config: TransportConfig,
    store: Weak<LiveStateStore>,
    session_code: String,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
}

impl SyncTransport {
    /// Link `store` to the relay, draining the receiving end of its outbound channel.
    pub fn new(
        config: TransportConfig,
        store: &Arc<LiveStateStore>,
        outbound: mpsc::UnboundedReceiver<ClientMessage>,
    ) -> Self {
        Self {
            config,
            session_code: store.identity().code.to_string(),
            store: Arc::downgrade(store),
            outbound,
        }
    }

    /// Keep the link up until the store goes away or reconnecting is exhausted.
    ///
    /// An attempt only counts as successful once the relay sent a frame back;
    /// links that accept the handshake and then drop count as failures.
    pub async fn run(mut self) -> ClientResult<()> {
        let mut failures = 0;
        loop {
            let heard = match connect_async(self.config.url.as_str()).await {
                Ok((socket, _)) => {
                    info!(url = %self.config.url, code = %self.session_code, "connected to relay");
                    let mut heard = false;
                    match self.pump(socket, &mut heard).await {
                        Ok(Exit::Shutdown) => return Ok(()),
                        Ok(Exit::Disconnected) => warn!(url = %self.config.url, "relay closed the connection"),
                        Err(err) => warn!(url = %self.config.url, error = %err, "relay connection failed"),
                    }
                    heard
                }
                Err(err) => {
                    warn!(url = %self.config.url, error = %err, "failed to reach relay");
                    false
                }
            };
            if heard {
                failures = 0;
            } else {
                failures += 1;
                debug!(attempt = failures, max = self.config.max_attempts, "relay attempt failed");
                if failures >= self.config.max_attempts {
                    return Err(ClientError::ReconnectExhausted { attempts: failures });
                }
            }
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn pump(&mut self, socket: Socket, heard: &mut bool) -> ClientResult<Exit> {
        let (mut sink, mut stream) = socket.split();

        loop {
            match self.outbound.try_recv() {
                Ok(stale) => debug!(?stale, "dropping message queued while offline"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(Exit::Shutdown),
            }
        }
        sink.send(encode(&ClientMessage::JoinSession(self.session_code.clone()))?)
            .await?;

        loop {
            tokio::select! {
                outbound = self.outbound.recv() => match outbound {
                    Some(message) => sink.send(encode(&message)?).await?,
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(Exit::Shutdown);
                    }
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        *heard = true;
                        let Some(store) = self.store.upgrade() else {
                            return Ok(Exit::Shutdown);
                        };
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(message) => store.apply_server_message(message),
                            Err(err) => warn!(error = %err, "ignoring malformed relay frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(Exit::Disconnected),
                    Some(Ok(_)) => *heard = true,
                    Some(Err(err)) => return Err(err.into()),
                },
            }
        }
    }
}

fn encode(message: &ClientMessage) -> ClientResult<Message> {
    Ok(Message::text(serde_json::to_string(message)?))
}

#[cfg(test)]
mod tests {
    use tokio::{net::TcpListener, task::JoinHandle};
    use uuid::Uuid;

    use super::*;
    use crate::{
        client::{MemoryPersistence, SessionIdentity},
        config::AppConfig,
        routes,
        state::{AppState, live::{MatchSettings, Side}, session_code::SessionCode},
    };

    async fn serve() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes::router(AppState::new(AppConfig::default()));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("ws://{addr}/ws")
    }

    fn device(url: &str, session_id: Uuid) -> (Arc<LiveStateStore>, JoinHandle<ClientResult<()>>) {
        let identity = SessionIdentity {
            id: session_id,
            code: SessionCode::parse("RELAY1").unwrap(),
            name: "Quinta".into(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(LiveStateStore::open(
            identity,
            MatchSettings::default(),
            Arc::new(MemoryPersistence::default()),
            tx,
        ));
        let transport = SyncTransport::new(TransportConfig::new(url), &store, rx);
        (store, tokio::spawn(transport.run()))
    }

    async fn eventually(mut condition: impl FnMut() -> bool, mut nudge: impl FnMut()) {
        let wait = async {
            while !condition() {
                nudge();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        within(wait).await;
    }

    async fn within<F: Future>(future: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(5), future).await.unwrap()
    }

    #[tokio::test]
    async fn devices_converge_through_the_relay() {
        let url = serve().await;
        let session_id = Uuid::new_v4();
        let (a, _) = device(&url, session_id);
        let (b, _) = device(&url, session_id);

        eventually(|| b.snapshot().score_a > 0, || a.adjust_score(Side::A, 1)).await;
        eventually(|| a.snapshot() == b.snapshot(), || {}).await;

        let before_undo = a.snapshot().history.iter().next().cloned().unwrap();
        assert!(b.undo());
        eventually(|| a.snapshot() == b.snapshot(), || {}).await;
        assert_eq!(a.snapshot().score_a, before_undo.score_a);
    }

    #[tokio::test]
    async fn dropping_the_store_stops_the_transport() {
        let url = serve().await;
        let (store, handle) = device(&url, Uuid::new_v4());
        store.adjust_score(Side::B, 1);
        drop(store);
        within(handle).await.unwrap().unwrap();
    }

    fn quick_retries(url: String) -> TransportConfig {
        let mut config = TransportConfig::new(url);
        config.reconnect_delay = Duration::from_millis(10);
        config.max_attempts = 3;
        config
    }

    fn lonely_store() -> (Arc<LiveStateStore>, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(LiveStateStore::open(
            SessionIdentity {
                id: Uuid::new_v4(),
                code: SessionCode::parse("NOBODY").unwrap(),
                name: "Quinta".into(),
            },
            MatchSettings::default(),
            Arc::new(MemoryPersistence::default()),
            tx,
        ));
        (store, rx)
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        drop(listener);

        let (store, rx) = lonely_store();
        let result = within(SyncTransport::new(quick_retries(url), &store, rx).run()).await;
        assert!(matches!(result, Err(ClientError::ReconnectExhausted { attempts: 3 })));
    }

    #[tokio::test]
    async fn handshakes_that_drop_at_once_count_as_failures() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                if let Ok(ws) = tokio_tungstenite::accept_async(socket).await {
                    drop(ws);
                }
            }
        });

        let (store, rx) = lonely_store();
        let result = within(SyncTransport::new(quick_retries(url), &store, rx).run()).await;
        assert!(matches!(result, Err(ClientError::ReconnectExhausted { attempts: 3 })));
    }
}
