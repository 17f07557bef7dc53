//! Bridge for venues that push opaque text frames.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, trace, warn};

use super::{apply_event, StreamEvent};
use crate::error::{Error, Result};
use crate::source::store::RateStore;

/// Venue adapter for a raw push stream.
///
/// The adapter decodes each text frame into zero or more events; the
/// lifecycle hooks default to doing nothing.
pub trait RawAdapter: Send + Sync {
    /// WebSocket URL to connect to.
    fn url(&self) -> &str;

    /// Frames to send right after the connection establishes, for venues
    /// that need a subscription message even on a raw stream.
    fn handshake(&self) -> Vec<String> {
        Vec::new()
    }

    /// Decode one text frame into events.
    ///
    /// # Errors
    ///
    /// A protocol error for a malformed frame; the bridge reports it and
    /// keeps reading.
    fn decode(&self, frame: &str) -> Result<Vec<StreamEvent>>;

    fn on_connected(&self) {}
    fn on_closed(&self) {}
    fn on_error(&self, _error: &Error) {}
}

/// Connection loop for a [`RawAdapter`], dispatching decoded events into
/// the store. Returns when the venue closes the connection or on the
/// first transport error; it never reconnects by itself.
pub struct RawBridge {
    adapter: Arc<dyn RawAdapter>,
    store: Arc<RateStore>,
}

impl RawBridge {
    #[must_use]
    pub fn new(adapter: Arc<dyn RawAdapter>, store: Arc<RateStore>) -> Self {
        Self { adapter, store }
    }

    /// Connect, send the handshake, and pump messages until close or
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

        for frame in self.adapter.handshake() {
            ws.send(Message::Text(frame)).await?;
        }

        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    trace!(bytes = text.len(), "stream frame");
                    match self.adapter.decode(&text) {
                        Ok(events) => {
                            for event in events {
                                apply_event(&self.store, event);
                            }
                        }
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
