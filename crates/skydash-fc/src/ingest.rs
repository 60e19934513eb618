use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use skydash_proto::telemetry::unix_now;
use skydash_proto::{TelemetryProvider, TelemetryRecord};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::address::{AddressError, ConnectionAddress};
use crate::dispatch::dispatch;
use crate::record;
use crate::source::{MavlinkSource, MessageSource, SourceError, StreamTarget};
use crate::state::{Fields, StateStore};

/// Resolved ingest timing and identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestSettings {
    /// How long `connect` waits for the transport to open, and then again
    /// for the first HEARTBEAT.
    pub heartbeat_timeout: Duration,
    /// Upper bound on a single receive or the stream request; also bounds
    /// how long `disconnect` waits for the ingest task.
    pub recv_timeout: Duration,
    /// Heartbeats older than this mark the vehicle DISCONNECTED.
    pub link_timeout: Duration,
    pub stream_rate_hz: u16,
    /// Our own MAVLink ids, used on the stream request.
    pub sys_id: u8,
    pub comp_id: u8,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(5),
            recv_timeout: Duration::from_secs(1),
            link_timeout: Duration::from_secs(5),
            stream_rate_hz: 10,
            sys_id: 255,
            comp_id: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Idle,
    Connecting,
    Streaming,
    /// Connect failed or the source closed underneath us.
    Error,
    Stopped,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("open {address}: {source}")]
    Transport {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("no heartbeat within {0:?}")]
    NoHeartbeat(Duration),

    #[error("link failed during handshake: {0}")]
    Handshake(#[source] SourceError),

    #[error("stream request failed: {0}")]
    StreamRequest(#[source] SourceError),

    #[error("already connected")]
    AlreadyConnected,
}

/// A live link: the run flag and the task that owns the source.
struct Connection {
    running: Arc<AtomicBool>,
    task: JoinHandle<Box<dyn MessageSource>>,
}

impl Connection {
    async fn shutdown(self) {
        self.running.store(false, Ordering::Release);
        match self.task.await {
            Ok(mut source) => source.close().await,
            Err(e) => warn!("mavlink: ingest task ended abnormally: {}", e),
        }
    }
}

/// Keeps a [`StateStore`] current from a MAVLink stream and serves
/// telemetry snapshots from it.
pub struct StreamingIngestor {
    settings: IngestSettings,
    store: Arc<StateStore>,
    state: Arc<Mutex<LinkState>>,
    // async mutex: held across the handshake so two connects cannot race
    conn: tokio::sync::Mutex<Option<Connection>>,
}

impl StreamingIngestor {
    pub fn new(settings: IngestSettings) -> Self {
        Self {
            settings,
            store: Arc::new(StateStore::new()),
            state: Arc::new(Mutex::new(LinkState::Idle)),
            conn: tokio::sync::Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw latest-known fields, with observation instants.
    pub fn fields(&self) -> Fields {
        self.store.snapshot()
    }

    pub fn reset(&self) {
        self.store.clear();
    }

    /// Opens `address`, waits for a heartbeat and starts ingesting.
    pub async fn connect(&self, address: &str) -> Result<(), ConnectError> {
        let mut slot = self.begin().await?;

        let address = match ConnectionAddress::parse(address) {
            Ok(a) => a,
            Err(e) => return Err(self.fail(e.into())),
        };
        // a tcpin listener or an unroutable tcpout can wait forever
        let open = MavlinkSource::open(&address, self.settings.sys_id, self.settings.comp_id);
        let opened = tokio::time::timeout(self.settings.heartbeat_timeout, open)
            .await
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "open timed out")));
        let source = match opened {
            Ok(s) => s,
            Err(source) => {
                return Err(self.fail(ConnectError::Transport {
                    address: address.to_string(),
                    source,
                }))
            }
        };

        self.start(&mut slot, Box::new(source)).await
    }

    /// Same as [`connect`](Self::connect) over an already open source.
    pub async fn connect_with(&self, source: Box<dyn MessageSource>) -> Result<(), ConnectError> {
        let mut slot = self.begin().await?;
        self.start(&mut slot, source).await
    }

    /// Stops the ingest task and closes the transport. Safe to call at any
    /// time and more than once.
    pub async fn disconnect(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.shutdown().await;
            info!("mavlink: disconnected");
        }
        if self.state() != LinkState::Idle {
            self.set_state(LinkState::Stopped);
        }
    }

    async fn begin(&self) -> Result<tokio::sync::MutexGuard<'_, Option<Connection>>, ConnectError> {
        let mut slot = self.conn.lock().await;
        if matches!(self.state(), LinkState::Connecting | LinkState::Streaming) {
            return Err(ConnectError::AlreadyConnected);
        }
        // a task that stopped on its own still holds the source
        if let Some(old) = slot.take() {
            old.shutdown().await;
        }
        self.store.clear();
        self.set_state(LinkState::Connecting);
        Ok(slot)
    }

    async fn start(
        &self,
        slot: &mut Option<Connection>,
        mut source: Box<dyn MessageSource>,
    ) -> Result<(), ConnectError> {
        let target = match self.await_heartbeat(source.as_mut()).await {
            Ok(t) => t,
            Err(e) => {
                source.close().await;
                return Err(self.fail(e));
            }
        };
        let request = source.request_streams(target, self.settings.stream_rate_hz);
        let requested = tokio::time::timeout(self.settings.recv_timeout, request)
            .await
            .unwrap_or_else(|_| {
                Err(SourceError::Io(io::Error::new(io::ErrorKind::TimedOut, "stream request timed out")))
            });
        if let Err(e) = requested {
            source.close().await;
            return Err(self.fail(ConnectError::StreamRequest(e)));
        }

        let running = Arc::new(AtomicBool::new(true));
        self.set_state(LinkState::Streaming);
        let task = tokio::spawn(ingest(
            source,
            self.store.clone(),
            self.state.clone(),
            running.clone(),
            self.settings.recv_timeout,
        ));
        *slot = Some(Connection { running, task });
        info!(
            "mavlink: streaming from {}/{}",
            target.system_id, target.component_id
        );
        Ok(())
    }

    /// Receives until the first HEARTBEAT. Frames before it, and the
    /// heartbeat itself, are not applied to the store.
    async fn await_heartbeat(&self, source: &mut dyn MessageSource) -> Result<StreamTarget, ConnectError> {
        let wait = self.settings.heartbeat_timeout;
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let frame = match tokio::time::timeout_at(deadline, source.recv()).await {
                Err(_) => return Err(ConnectError::NoHeartbeat(wait)),
                Ok(Ok(frame)) => frame,
                Ok(Err(SourceError::Closed)) => return Err(ConnectError::Handshake(SourceError::Closed)),
                Ok(Err(e)) => {
                    debug!("mavlink: waiting for heartbeat: {}", e);
                    continue;
                }
            };
            if frame.message.is_heartbeat() {
                return Ok(StreamTarget {
                    system_id: frame.system_id,
                    component_id: frame.component_id,
                });
            }
        }
    }

    fn fail(&self, e: ConnectError) -> ConnectError {
        warn!("mavlink: connect failed: {}", e);
        self.set_state(LinkState::Error);
        e
    }

    fn set_state(&self, next: LinkState) {
        set_state(&self.state, next);
    }
}

impl Default for StreamingIngestor {
    fn default() -> Self {
        Self::new(IngestSettings::default())
    }
}

impl Drop for StreamingIngestor {
    fn drop(&mut self) {
        // the task notices within one recv_timeout and drops the source
        if let Some(conn) = self.conn.get_mut().take() {
            conn.running.store(false, Ordering::Release);
        }
    }
}

fn set_state(state: &Mutex<LinkState>, next: LinkState) {
    let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
    if *s != next {
        debug!("mavlink: link {:?} -> {:?}", *s, next);
        *s = next;
    }
}

/// The only writer of the store while a link is up.
async fn ingest(
    mut source: Box<dyn MessageSource>,
    store: Arc<StateStore>,
    state: Arc<Mutex<LinkState>>,
    running: Arc<AtomicBool>,
    recv_timeout: Duration,
) -> Box<dyn MessageSource> {
    while running.load(Ordering::Acquire) {
        match tokio::time::timeout(recv_timeout, source.recv()).await {
            Err(_) => continue,
            Ok(Ok(frame)) => {
                dispatch(&store, &frame.message, Instant::now());
            }
            Ok(Err(SourceError::Closed)) => {
                warn!("mavlink: source closed, ingest stopped");
                set_state(&state, LinkState::Error);
                break;
            }
            Ok(Err(e)) => warn!("mavlink: receive error: {}", e),
        }
    }
    debug!("mavlink: ingest task exiting");
    source
}

#[async_trait]
impl TelemetryProvider for StreamingIngestor {
    fn name(&self) -> &'static str {
        "mavlink"
    }

    async fn telemetry(&self) -> TelemetryRecord {
        let fields = self.store.snapshot();
        record::assemble(
            &fields,
            self.state(),
            self.settings.link_timeout,
            Instant::now(),
            unix_now(),
        )
    }
}
