//! Entry point of the engine.
//!
//! A [`Device`] is loaded once with the server's router capabilities. It
//! discovers what the local peer connection supports from a throwaway
//! offer, computes the extended capabilities, and from then on creates
//! send and receive transports that share them.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::error::{NegotiationErrorKind, Result, SfuError};
use crate::ortc::{
    self, ExtendedRtpCapabilities, MediaKind, NumSctpStreams, RtpCapabilities, SctpCapabilities,
};
use crate::peer::{OfferOptions, PeerConnectionConfig, PeerConnectionFactory, TransceiverInit};
use crate::sdp::{self, Direction};
use crate::signaling::{SignalingChannel, TransportDirection};
use crate::transport::{Transport, TransportContext, TransportOptions};

/// SCTP stream counts advertised to the server.
const SCTP_NUM_STREAMS: NumSctpStreams = NumSctpStreams { os: 1024, mis: 1024 };

struct Loaded {
    extended: Arc<ExtendedRtpCapabilities>,
    recv_rtp_capabilities: RtpCapabilities,
}

pub struct Device {
    config: Arc<EngineConfig>,
    factory: Arc<dyn PeerConnectionFactory>,
    signaling: Arc<dyn SignalingChannel>,
    loaded: RwLock<Option<Loaded>>,
}

impl Device {
    pub fn new(
        config: EngineConfig,
        factory: Arc<dyn PeerConnectionFactory>,
        signaling: Arc<dyn SignalingChannel>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            factory,
            signaling,
            loaded: RwLock::new(None),
        }
    }

    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.read().is_some()
    }

    /// Load the router capabilities. Fails if already loaded.
    pub async fn load(&self, mut router_rtp_capabilities: RtpCapabilities) -> Result<()> {
        if self.is_loaded() {
            return Err(SfuError::Negotiation(NegotiationErrorKind::DeviceAlreadyLoaded));
        }
        ortc::validate_rtp_capabilities(&mut router_rtp_capabilities)?;

        let native = self.native_rtp_capabilities().await?;
        self.load_with_native(native, router_rtp_capabilities)
    }

    /// Load from already known native capabilities, without probing a peer
    /// connection. Both inputs are validated as in [`Device::load`].
    pub fn load_with_native(&self, mut native: RtpCapabilities, mut router: RtpCapabilities) -> Result<()> {
        ortc::validate_rtp_capabilities(&mut native)?;
        ortc::validate_rtp_capabilities(&mut router)?;
        let extended = ortc::get_extended_rtp_capabilities(&native, &router);
        let mut recv_rtp_capabilities = ortc::get_recv_rtp_capabilities(&extended);
        ortc::validate_rtp_capabilities(&mut recv_rtp_capabilities)?;

        let mut loaded = self.loaded.write();
        if loaded.is_some() {
            return Err(SfuError::Negotiation(NegotiationErrorKind::DeviceAlreadyLoaded));
        }
        tracing::info!(
            codecs = extended.codecs.len(),
            header_extensions = extended.header_extensions.len(),
            "device loaded"
        );
        *loaded = Some(Loaded {
            extended: Arc::new(extended),
            recv_rtp_capabilities,
        });
        Ok(())
    }

    /// Capabilities of the local peer connection, from a recvonly offer.
    async fn native_rtp_capabilities(&self) -> Result<RtpCapabilities> {
        let pc = self.factory.create(PeerConnectionConfig::default()).await?;
        let result = async {
            for kind in [MediaKind::Audio, MediaKind::Video] {
                pc.add_transceiver(TransceiverInit {
                    kind,
                    track: None,
                    direction: Direction::RecvOnly,
                    stream_ids: Vec::new(),
                    send_encodings: Vec::new(),
                })
                .await?;
            }
            let offer = pc.create_offer(OfferOptions::default()).await?;
            let doc = sdp::parse(&offer)?;
            Ok(sdp::extract_rtp_capabilities(&doc))
        }
        .await;
        pc.close();
        result
    }

    fn with_loaded<T>(&self, f: impl FnOnce(&Loaded) -> T) -> Result<T> {
        self.loaded
            .read()
            .as_ref()
            .map(f)
            .ok_or(SfuError::Negotiation(NegotiationErrorKind::DeviceNotLoaded))
    }

    /// What this device can receive; sent to the server before consuming.
    pub fn rtp_capabilities(&self) -> Result<RtpCapabilities> {
        self.with_loaded(|loaded| loaded.recv_rtp_capabilities.clone())
    }

    pub fn extended_rtp_capabilities(&self) -> Result<Arc<ExtendedRtpCapabilities>> {
        self.with_loaded(|loaded| loaded.extended.clone())
    }

    pub fn sctp_capabilities(&self) -> SctpCapabilities {
        SctpCapabilities {
            num_streams: SCTP_NUM_STREAMS,
        }
    }

    pub fn can_produce(&self, kind: MediaKind) -> Result<bool> {
        self.with_loaded(|loaded| ortc::can_send(kind, &loaded.extended))
    }

    pub async fn create_send_transport(&self, options: TransportOptions) -> Result<Arc<Transport>> {
        self.create_transport(TransportDirection::Send, options).await
    }

    pub async fn create_recv_transport(&self, options: TransportOptions) -> Result<Arc<Transport>> {
        self.create_transport(TransportDirection::Recv, options).await
    }

    async fn create_transport(&self, direction: TransportDirection, options: TransportOptions) -> Result<Arc<Transport>> {
        let extended = self.extended_rtp_capabilities()?;
        let pc = self
            .factory
            .create(PeerConnectionConfig {
                ice_servers: options.ice_servers.clone(),
                ice_transport_policy: options.ice_transport_policy,
            })
            .await?;
        Transport::new(
            direction,
            options,
            TransportContext {
                config: self.config.clone(),
                extended,
                signaling: self.signaling.clone(),
                pc,
            },
        )
    }
}
