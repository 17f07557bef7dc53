//! Bridge for venues that multiplex events over named rooms.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, trace, warn};

use super::{apply_event, StreamEvent};
use crate::error::{Error, Result};
use crate::source::store::RateStore;

/// One demultiplexed frame: which room it came from and the event it
/// carried.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub room: String,
    pub event: StreamEvent,
}

/// Venue adapter for a room/event-multiplexed stream.
///
/// After the connection establishes, the bridge subscribes to every room
/// the adapter names; the adapter then decodes each frame into an
/// optional [`RoomEvent`] (`None` for transport-level frames such as
/// handshake acks and heartbeats).
pub trait RoomAdapter: Send + Sync {
    /// WebSocket URL to connect to.
    fn url(&self) -> &str;

    /// Rooms to subscribe to after connecting.
    fn rooms(&self) -> Vec<String>;

    /// Build the subscribe frame for one room.
    fn subscribe_frame(&self, room: &str) -> String;

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// A protocol error for a malformed frame; the bridge reports it and
    /// keeps reading.
    fn decode(&self, frame: &str) -> Result<Option<RoomEvent>>;

    fn on_connected(&self) {}
    fn on_closed(&self) {}
    fn on_error(&self, _error: &Error) {}
}

/// Connection loop for a [`RoomAdapter`]: subscribe handshake, then
/// demultiplex incoming events into the store. Ticker and book events are
/// applied, trades and announcements are informational no-ops, and
/// unrecognized kinds are silently ignored. Never reconnects by itself.
pub struct RoomBridge {
    adapter: Arc<dyn RoomAdapter>,
    store: Arc<RateStore>,
}

impl RoomBridge {
    #[must_use]
    pub fn new(adapter: Arc<dyn RoomAdapter>, store: Arc<RateStore>) -> Self {
        Self { adapter, store }
    }

    /// Connect, subscribe to every room, and pump messages until close or
    /// error.
    ///
    /// # Errors
    ///
    /// Connection establishment and transport failures. Per-frame decode
    /// failures are reported through the error channel instead.
    pub async fn run(&self) -> Result<()> {
        info!(url = %self.adapter.url(), "connecting to stream");
        let (mut ws, _response) = connect_async(self.adapter.url()).await?;
        info!(source = self.store.name(), "stream connected");
        self.adapter.on_connected();

        for room in self.adapter.rooms() {
            info!(source = self.store.name(), %room, "subscribing");
            ws.send(Message::Text(self.adapter.subscribe_frame(&room)))
                .await?;
        }

        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    trace!(bytes = text.len(), "stream frame");
                    match self.adapter.decode(&text) {
                        Ok(Some(RoomEvent { room, event })) => {
                            trace!(%room, "room event");
                            apply_event(&self.store, event);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(error = %e, "failed to decode frame");
                            self.store.log_error(&format!("bad frame: {e}"));
                        }
                    }
                }
                Ok(Message::Ping(payload)) => {
                    ws.send(Message::Pong(payload)).await?;
                }
                Ok(Message::Close(frame)) => {
                    info!(source = self.store.name(), frame = ?frame, "stream closed by venue");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    let err = Error::from(e);
                    self.adapter.on_error(&err);
                    return Err(err);
                }
            }
        }

        self.adapter.on_closed();
        Ok(())
    }
}
