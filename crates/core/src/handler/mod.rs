//! Negotiation handlers.
//!
//! A handler drives one direction of a transport through offer/answer
//! cycles against a [`PeerConnection`]. It owns the [`RemoteSdp`] for that
//! direction, so it must never run two operations at once; transports keep
//! their handler behind an async mutex.
//!
//! ```text
//!   SendHandler: add transceiver ─► create offer ─► set local ─► RemoteSdp::send ─► set remote (answer)
//!   RecvHandler: RemoteSdp::receive ─► set remote (offer) ─► create answer ─► set local
//! ```
//!
//! Both directions run a one-time transport setup on their first
//! description exchange: the DTLS parameters of the local description are
//! reported to the [`DtlsConnector`] and the opposite role is written into
//! the remote SDP.

mod recv;
mod send;

use std::sync::Arc;

use async_trait::async_trait;

pub use recv::{HandlerReceiveOptions, HandlerReceiveResult, RecvHandler};
pub use send::{HandlerSendOptions, HandlerSendResult, SendHandler};

use crate::config::EngineConfig;
use crate::error::{NegotiationErrorKind, Result, SfuError, StateErrorKind};
use crate::ortc::{DtlsParameters, DtlsRole, IceCandidate, IceParameters};
use crate::peer::{IceServer, PeerConnection, StatsReport, TransceiverId, TransceiverInfo};
use crate::remote_sdp::RemoteSdp;
use crate::sdp::{self, SessionDescription, extract_dtls_parameters};

/// Receives the local DTLS parameters once the transport is set up.
#[async_trait]
pub trait DtlsConnector: Send + Sync {
    async fn connect(&self, dtls_parameters: DtlsParameters) -> Result<()>;
}

/// Everything a handler needs from the transport that owns it.
pub struct HandlerRunOptions {
    pub transport_id: String,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
    pub peer_connection: Arc<dyn PeerConnection>,
    pub connector: Arc<dyn DtlsConnector>,
    pub config: Arc<EngineConfig>,
}

/// State shared by both handler directions.
pub struct HandlerCore {
    transport_id: String,
    pc: Arc<dyn PeerConnection>,
    remote_sdp: RemoteSdp,
    connector: Arc<dyn DtlsConnector>,
    /// Set when the remote declared a concrete role; we take the other one.
    forced_local_dtls_role: Option<DtlsRole>,
    transport_ready: bool,
    closed: bool,
}

impl HandlerCore {
    fn new(options: HandlerRunOptions) -> Self {
        let forced_local_dtls_role = forced_local_dtls_role(options.dtls_parameters.role);
        let remote_sdp = RemoteSdp::new(
            options.ice_parameters,
            options.ice_candidates,
            options.dtls_parameters,
            &options.config,
        );
        Self {
            transport_id: options.transport_id,
            pc: options.peer_connection,
            remote_sdp,
            connector: options.connector,
            forced_local_dtls_role,
            transport_ready: false,
            closed: false,
        }
    }

    pub fn transport_id(&self) -> &str {
        &self.transport_id
    }

    pub fn is_transport_ready(&self) -> bool {
        self.transport_ready
    }

    pub fn remote_sdp(&self) -> &RemoteSdp {
        &self.remote_sdp
    }

    /// Role the local side takes in the DTLS handshake.
    fn local_dtls_role(&self) -> DtlsRole {
        self.forced_local_dtls_role.unwrap_or(DtlsRole::Client)
    }

    /// Report local DTLS parameters and flip the remote role. Runs once.
    async fn setup_transport(&mut self, local_sdp: &SessionDescription) -> Result<()> {
        let role = self.local_dtls_role();
        let mut dtls_parameters = extract_dtls_parameters(local_sdp)?;
        dtls_parameters.role = Some(role);

        self.remote_sdp.update_dtls_role(role.opposite());
        self.connector.connect(dtls_parameters).await?;
        self.transport_ready = true;
        tracing::info!(transport_id = %self.transport_id, local_role = ?role, "transport set up");
        Ok(())
    }

    async fn setup_if_needed(&mut self, local_sdp: &SessionDescription) -> Result<()> {
        if self.transport_ready {
            return Ok(());
        }
        self.setup_transport(local_sdp).await
    }

    fn current_local_description(&self) -> Result<SessionDescription> {
        let text = self
            .pc
            .local_description()
            .ok_or_else(|| SfuError::transport("local_description", "no local description"))?;
        sdp::parse(&text)
    }

    fn transceiver_by_mid(&self, mid: &str) -> Option<TransceiverInfo> {
        self.pc
            .transceivers()
            .into_iter()
            .find(|t| t.mid.as_deref() == Some(mid))
    }

    fn transceiver_by_id(&self, id: TransceiverId) -> Option<TransceiverInfo> {
        self.pc.transceivers().into_iter().find(|t| t.id == id)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SfuError::State(StateErrorKind::TransportClosed));
        }
        Ok(())
    }
}

/// A concrete remote role pins ours to its opposite; `auto` leaves it open.
fn forced_local_dtls_role(remote: Option<DtlsRole>) -> Option<DtlsRole> {
    remote.filter(|role| *role != DtlsRole::Auto).map(DtlsRole::opposite)
}

fn transceiver_not_found(local_id: &str) -> SfuError {
    SfuError::Negotiation(NegotiationErrorKind::TransceiverNotFound(local_id.to_string()))
}

/// Operations both handler directions support.
#[async_trait]
pub trait Negotiable: Send + Sync {
    fn core(&self) -> &HandlerCore;
    fn core_mut(&mut self) -> &mut HandlerCore;

    /// One offer/answer cycle that leaves media content untouched.
    async fn renegotiate(&mut self, ice_restart: bool) -> Result<()>;

    /// Apply fresh remote ICE parameters. Renegotiates only once the
    /// transport has been set up.
    async fn restart_ice(&mut self, ice_parameters: IceParameters) -> Result<()> {
        let core = self.core_mut();
        core.ensure_open()?;
        core.remote_sdp.update_ice_parameters(ice_parameters);
        if !core.transport_ready {
            tracing::debug!(transport_id = %core.transport_id, "ICE restart before setup, no renegotiation");
            return Ok(());
        }
        self.renegotiate(true).await
    }

    async fn get_transport_stats(&self) -> Result<StatsReport> {
        self.core().ensure_open()?;
        self.core().pc.get_stats().await
    }

    fn update_ice_servers(&self, servers: Vec<IceServer>) -> Result<()> {
        self.core().ensure_open()?;
        self.core().pc.set_ice_servers(servers)
    }

    fn close(&mut self) {
        let core = self.core_mut();
        if core.closed {
            return;
        }
        core.closed = true;
        core.pc.close();
        tracing::debug!(transport_id = %core.transport_id, "handler closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_role_forces_local_role() {
        assert_eq!(forced_local_dtls_role(Some(DtlsRole::Server)), Some(DtlsRole::Client));
        assert_eq!(forced_local_dtls_role(Some(DtlsRole::Client)), Some(DtlsRole::Server));
        assert_eq!(forced_local_dtls_role(Some(DtlsRole::Auto)), None);
        assert_eq!(forced_local_dtls_role(None), None);
    }
}
