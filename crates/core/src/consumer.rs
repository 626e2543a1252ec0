//! Handle of one incoming track.

use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;

use crate::error::{Result, SfuError, StateErrorKind};
use crate::ortc::{MediaKind, RtpParameters};
use crate::peer::{StatsReport, TrackRef};
use crate::transport::Transport;

/// Server description of a consumer to create.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerOptions {
    pub id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    /// Remote participant owning the producer. At most one video consumer
    /// per participant is kept.
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub app_data: serde_json::Value,
}

#[derive(Debug)]
pub struct Consumer {
    id: String,
    local_id: String,
    producer_id: String,
    kind: MediaKind,
    participant_id: Option<String>,
    rtp_parameters: RtpParameters,
    track: Option<TrackRef>,
    paused: AtomicBool,
    closed: AtomicBool,
    app_data: serde_json::Value,
    transport: Weak<Transport>,
}

impl Consumer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        local_id: String,
        producer_id: String,
        kind: MediaKind,
        participant_id: Option<String>,
        rtp_parameters: RtpParameters,
        track: Option<TrackRef>,
        app_data: serde_json::Value,
        transport: Weak<Transport>,
    ) -> Self {
        Self {
            id,
            local_id,
            producer_id,
            kind,
            participant_id,
            rtp_parameters,
            track,
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            app_data,
            transport,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant_id.as_deref()
    }

    pub fn rtp_parameters(&self) -> &RtpParameters {
        &self.rtp_parameters
    }

    pub fn track(&self) -> Option<&TrackRef> {
        self.track.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn app_data(&self) -> &serde_json::Value {
        &self.app_data
    }

    pub fn pause(&self) {
        if self.is_closed() {
            return;
        }
        self.paused.store(true, Ordering::SeqCst);
        if let Some(track) = &self.track {
            track.set_enabled(false);
        }
    }

    pub fn resume(&self) {
        if self.is_closed() {
            return;
        }
        self.paused.store(false, Ordering::SeqCst);
        if let Some(track) = &self.track {
            track.set_enabled(true);
        }
    }

    pub async fn get_stats(&self) -> Result<StatsReport> {
        if self.is_closed() {
            return Err(SfuError::State(StateErrorKind::ConsumerClosed));
        }
        let transport = self
            .transport
            .upgrade()
            .ok_or(SfuError::State(StateErrorKind::TransportClosed))?;
        transport.consumer_stats(&self.local_id).await
    }

    /// Stop receiving and close the media section.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(consumer_id = %self.id, local_id = %self.local_id, "consumer closed");
        match self.transport.upgrade() {
            Some(transport) => transport.stop_consumer(self).await,
            None => Ok(()),
        }
    }

    /// Closed by its transport while the transport renegotiates itself.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns false when the consumer was already closed.
    pub(crate) fn transport_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::debug!(consumer_id = %self.id, "consumer closed with its transport");
        true
    }
}
