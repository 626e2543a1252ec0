use std::collections::HashMap;

use async_trait::async_trait;

use super::{HandlerCore, HandlerRunOptions, Negotiable, transceiver_not_found};
use crate::error::Result;
use crate::ortc::{MediaKind, PROBATOR_MID, RtpParameters};
use crate::peer::{SdpType, StatsReport, TransceiverId};
use crate::remote_sdp::ReceiveSection;
use crate::sdp::{self, apply_codec_parameters};

pub struct HandlerReceiveOptions {
    /// Id of the remote track; becomes the msid track id.
    pub track_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    /// Msid stream id; the RTCP cname when `None`.
    pub stream_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerReceiveResult {
    pub local_id: String,
    pub transceiver: TransceiverId,
}

/// Receive direction of a transport.
pub struct RecvHandler {
    core: HandlerCore,
    transceivers: HashMap<String, TransceiverId>,
    next_local_id: u64,
}

impl RecvHandler {
    pub fn new(options: HandlerRunOptions) -> Self {
        Self {
            core: HandlerCore::new(options),
            transceivers: HashMap::new(),
            next_local_id: 0,
        }
    }

    /// `r<mid>` for a remote mid, else the next counter value.
    fn allocate_local_id(&mut self, remote_mid: Option<&str>) -> String {
        match remote_mid {
            Some(PROBATOR_MID) => PROBATOR_MID.to_string(),
            Some(mid) => format!("r{mid}"),
            None => {
                let id = self.next_local_id;
                self.next_local_id += 1;
                id.to_string()
            }
        }
    }

    pub fn has_local_id(&self, local_id: &str) -> bool {
        self.transceivers.contains_key(local_id)
    }

    /// Negotiate a remote producer's stream.
    ///
    /// A missing transceiver after the answer is applied is fatal for the
    /// transport.
    pub async fn receive(&mut self, options: HandlerReceiveOptions) -> Result<HandlerReceiveResult> {
        self.core.ensure_open()?;
        let local_id = self.allocate_local_id(options.rtp_parameters.mid.as_deref());
        let stream_id = options
            .stream_id
            .or_else(|| options.rtp_parameters.rtcp.cname.clone())
            .unwrap_or_else(|| "-".to_string());
        tracing::debug!(
            transport_id = %self.core.transport_id,
            %local_id,
            kind = %options.kind,
            track_id = %options.track_id,
            "receive"
        );

        self.core.remote_sdp.receive(ReceiveSection {
            mid: &local_id,
            kind: options.kind,
            offer_rtp_parameters: &options.rtp_parameters,
            stream_id: &stream_id,
            track_id: &options.track_id,
        })?;
        let offer = self.core.remote_sdp.get_sdp()?;
        self.core.pc.set_remote_description(SdpType::Offer, &offer).await?;

        let answer = self.core.pc.create_answer().await?;
        let mut answer_doc = sdp::parse(&answer)?;
        if let Some(answer_media) = answer_doc
            .media
            .iter_mut()
            .find(|m| m.mid.as_deref() == Some(local_id.as_str()))
        {
            apply_codec_parameters(&options.rtp_parameters, answer_media);
        }
        let answer = sdp::write(&answer_doc)?;

        self.core.setup_if_needed(&answer_doc).await?;
        self.core.pc.set_local_description(SdpType::Answer, &answer).await?;

        let transceiver = self
            .core
            .transceiver_by_mid(&local_id)
            .ok_or_else(|| transceiver_not_found(&local_id))?
            .id;
        self.transceivers.insert(local_id.clone(), transceiver);
        Ok(HandlerReceiveResult { local_id, transceiver })
    }

    /// Close the section of `local_id` and renegotiate.
    pub async fn stop_receiving(&mut self, local_id: &str) -> Result<()> {
        self.core.ensure_open()?;
        if !self.transceivers.contains_key(local_id) {
            return Err(transceiver_not_found(local_id));
        }
        tracing::debug!(transport_id = %self.core.transport_id, %local_id, "stop receiving");

        self.core.remote_sdp.close_media_section(local_id)?;
        self.renegotiate(false).await?;
        self.transceivers.remove(local_id);
        Ok(())
    }

    pub async fn get_receiver_stats(&self, local_id: &str) -> Result<StatsReport> {
        self.core.ensure_open()?;
        let transceiver = *self
            .transceivers
            .get(local_id)
            .ok_or_else(|| transceiver_not_found(local_id))?;
        self.core.pc.get_receiver_stats(transceiver).await
    }
}

#[async_trait]
impl Negotiable for RecvHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    async fn renegotiate(&mut self, ice_restart: bool) -> Result<()> {
        let offer = self.core.remote_sdp.get_sdp()?;
        self.core.pc.set_remote_description(SdpType::Offer, &offer).await?;
        let answer = self.core.pc.create_answer().await?;
        self.core.pc.set_local_description(SdpType::Answer, &answer).await?;
        tracing::debug!(transport_id = %self.core.transport_id, ice_restart, "recv renegotiated");
        Ok(())
    }
}
