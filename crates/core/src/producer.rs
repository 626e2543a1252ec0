//! Handle of one outgoing track.

use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{NegotiationErrorKind, Result, SfuError, StateErrorKind};
use crate::ortc::{MediaKind, RtpParameters};
use crate::peer::{StatsReport, TrackRef};
use crate::transport::Transport;

/// A track being sent on a send transport.
///
/// Closing is terminal. Once closed, `pause`/`resume` do nothing and every
/// other operation fails with a state error.
#[derive(Debug)]
pub struct Producer {
    id: String,
    local_id: String,
    kind: MediaKind,
    rtp_parameters: RtpParameters,
    track: RwLock<Option<TrackRef>>,
    paused: AtomicBool,
    closed: AtomicBool,
    max_spatial_layer: RwLock<Option<u8>>,
    app_data: serde_json::Value,
    transport: Weak<Transport>,
}

impl Producer {
    pub(crate) fn new(
        id: String,
        local_id: String,
        track: TrackRef,
        rtp_parameters: RtpParameters,
        app_data: serde_json::Value,
        transport: Weak<Transport>,
    ) -> Self {
        let kind = track.kind();
        let paused = !track.is_enabled();
        Self {
            id,
            local_id,
            kind,
            rtp_parameters,
            track: RwLock::new(Some(track)),
            paused: AtomicBool::new(paused),
            closed: AtomicBool::new(false),
            max_spatial_layer: RwLock::new(None),
            app_data,
            transport,
        }
    }

    /// Server-assigned id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Mid of the sending media section.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn rtp_parameters(&self) -> &RtpParameters {
        &self.rtp_parameters
    }

    pub fn track(&self) -> Option<TrackRef> {
        self.track.read().clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_spatial_layer(&self) -> Option<u8> {
        *self.max_spatial_layer.read()
    }

    pub fn app_data(&self) -> &serde_json::Value {
        &self.app_data
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SfuError::State(StateErrorKind::ProducerClosed));
        }
        Ok(())
    }

    fn transport(&self) -> Result<std::sync::Arc<Transport>> {
        self.transport
            .upgrade()
            .ok_or(SfuError::State(StateErrorKind::TransportClosed))
    }

    /// Disable the track. No renegotiation.
    pub fn pause(&self) {
        if self.is_closed() {
            tracing::debug!(producer_id = %self.id, "pause on closed producer ignored");
            return;
        }
        self.paused.store(true, Ordering::SeqCst);
        if let Some(track) = self.track.read().as_ref() {
            track.set_enabled(false);
        }
    }

    pub fn resume(&self) {
        if self.is_closed() {
            tracing::debug!(producer_id = %self.id, "resume on closed producer ignored");
            return;
        }
        self.paused.store(false, Ordering::SeqCst);
        if let Some(track) = self.track.read().as_ref() {
            track.set_enabled(true);
        }
    }

    /// Send another track (or nothing) on the same sender. The paused state
    /// carries over to the new track.
    pub async fn replace_track(&self, track: Option<TrackRef>) -> Result<()> {
        self.ensure_open()?;
        if let Some(track) = &track {
            if track.is_ended() {
                return Err(SfuError::Negotiation(NegotiationErrorKind::TrackEnded));
            }
            if self.track.read().as_ref().is_some_and(|current| current.id() == track.id()) {
                tracing::debug!(producer_id = %self.id, "same track, nothing to replace");
                return Ok(());
            }
        }

        self.transport()?
            .replace_producer_track(&self.local_id, track.clone())
            .await?;
        if self.is_closed() {
            return Ok(());
        }
        if let Some(track) = &track {
            track.set_enabled(!self.is_paused());
        }
        *self.track.write() = track;
        Ok(())
    }

    /// Send only encodings `0..=layer`.
    pub async fn set_max_spatial_layer(&self, layer: u8) -> Result<()> {
        self.ensure_open()?;
        if self.kind != MediaKind::Video {
            return Err(SfuError::Negotiation(NegotiationErrorKind::WrongKind(MediaKind::Video)));
        }
        if self.max_spatial_layer() == Some(layer) {
            return Ok(());
        }
        self.transport()?
            .set_producer_max_spatial_layer(&self.local_id, layer, self.rtp_parameters.encodings.len())
            .await?;
        *self.max_spatial_layer.write() = Some(layer);
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<StatsReport> {
        self.ensure_open()?;
        self.transport()?.producer_stats(&self.local_id).await
    }

    /// Stop sending and release the media section.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(producer_id = %self.id, local_id = %self.local_id, "producer closed");
        match self.transport.upgrade() {
            Some(transport) => transport.stop_producer(self).await,
            None => Ok(()),
        }
    }

    /// The owning transport closed; nothing to renegotiate.
    /// Returns false when the producer was already closed.
    pub(crate) fn transport_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::debug!(producer_id = %self.id, "producer closed with its transport");
        true
    }
}
