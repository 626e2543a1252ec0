//! Contract of the native peer connection.
//!
//! The engine never touches media. It drives a WebRTC-style peer connection
//! through [`PeerConnection`]: offer/answer, local/remote descriptions,
//! transceivers, ICE state and statistics. Implementations report failures
//! as [`SfuError::Transport`](crate::SfuError::Transport).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ortc::{MediaKind, RtpEncodingParameters};
use crate::sdp::Direction;

/// A local or remote media track.
///
/// `enabled` is the only state the engine toggles; pausing a producer or
/// consumer never renegotiates.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> String;
    fn kind(&self) -> MediaKind;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    fn is_ended(&self) -> bool;
}

pub type TrackRef = Arc<dyn MediaTrack>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

impl SdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
        }
    }
}

/// ICE connection states (W3C `RTCIceConnectionState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferOptions {
    pub ice_restart: bool,
}

/// Handle of a transceiver inside one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransceiverId(pub u64);

impl fmt::Display for TransceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct TransceiverInit {
    pub kind: MediaKind,
    pub track: Option<TrackRef>,
    pub direction: Direction,
    pub stream_ids: Vec<String>,
    pub send_encodings: Vec<RtpEncodingParameters>,
}

/// Snapshot of a transceiver. `mid` is assigned once a local description
/// containing it has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TransceiverInfo {
    pub id: TransceiverId,
    pub mid: Option<String>,
    pub kind: MediaKind,
    pub direction: Direction,
    pub stopped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    #[default]
    All,
    Relay,
}

/// Configuration of a new peer connection. Bundling and RTCP muxing are
/// always `max-bundle` / `require`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerConnectionConfig {
    pub ice_servers: Vec<IceServer>,
    pub ice_transport_policy: IceTransportPolicy,
}

/// Statistics snapshot as produced by the native stack.
pub type StatsReport = serde_json::Value;

pub type IceStateCallback = Box<dyn Fn(IceConnectionState) + Send + Sync>;

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self, options: OfferOptions) -> Result<String>;
    async fn create_answer(&self) -> Result<String>;
    async fn set_local_description(&self, kind: SdpType, sdp: &str) -> Result<()>;
    async fn set_remote_description(&self, kind: SdpType, sdp: &str) -> Result<()>;
    fn local_description(&self) -> Option<String>;

    async fn add_transceiver(&self, init: TransceiverInit) -> Result<TransceiverId>;
    fn transceivers(&self) -> Vec<TransceiverInfo>;
    /// Detach the sender's track; the transceiver keeps its mid.
    async fn remove_track(&self, id: TransceiverId) -> Result<()>;
    async fn replace_sender_track(&self, id: TransceiverId, track: Option<TrackRef>) -> Result<()>;
    /// `active[i]` applies to the sender's `i`-th encoding.
    async fn set_sender_active_encodings(&self, id: TransceiverId, active: &[bool]) -> Result<()>;
    async fn stop_transceiver(&self, id: TransceiverId) -> Result<()>;
    /// Track delivered by a receiving transceiver.
    fn receiver_track(&self, id: TransceiverId) -> Option<TrackRef>;

    fn on_ice_connection_state_change(&self, callback: IceStateCallback);

    async fn get_stats(&self) -> Result<StatsReport>;
    async fn get_sender_stats(&self, id: TransceiverId) -> Result<StatsReport>;
    async fn get_receiver_stats(&self, id: TransceiverId) -> Result<StatsReport>;

    fn set_ice_servers(&self, servers: Vec<IceServer>) -> Result<()>;
    fn close(&self);
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self, config: PeerConnectionConfig) -> Result<Arc<dyn PeerConnection>>;
}
