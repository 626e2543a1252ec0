use std::collections::HashMap;

use async_trait::async_trait;

use super::{HandlerCore, HandlerRunOptions, Negotiable, transceiver_not_found};
use crate::error::{NegotiationErrorKind, Result, SfuError};
use crate::ortc::{
    MediaKind, RtpCodecCapability, RtpEncodingParameters, RtpParameters, reduce_codecs,
};
use crate::peer::{OfferOptions, SdpType, StatsReport, TrackRef, TransceiverId, TransceiverInit};
use crate::remote_sdp::{CodecOptions, SendSection};
use crate::sdp::{self, Direction, MediaDescription, get_cname, get_rtp_encodings};

/// Codecs whose multi-encoding sends signal temporal layers.
const TEMPORAL_LAYER_CODECS: [&str; 2] = ["video/vp8", "video/h264"];
const DEFAULT_SCALABILITY_MODE: &str = "S1T3";

pub struct HandlerSendOptions {
    pub track: TrackRef,
    /// Caller encodings; empty means "as offered".
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<CodecOptions>,
    /// Preferred codec; the first negotiated codec when `None`.
    pub codec: Option<RtpCodecCapability>,
}

#[derive(Debug, Clone)]
pub struct HandlerSendResult {
    pub local_id: String,
    pub rtp_parameters: RtpParameters,
}

/// Send direction of a transport.
pub struct SendHandler {
    core: HandlerCore,
    sending_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
    sending_remote_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
    /// local id (mid) to transceiver.
    transceivers: HashMap<String, TransceiverId>,
    stream_id: String,
}

impl SendHandler {
    pub fn new(
        options: HandlerRunOptions,
        sending_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
        sending_remote_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
    ) -> Self {
        let stream_id = format!("{}-send", options.transport_id);
        Self {
            core: HandlerCore::new(options),
            sending_rtp_parameters_by_kind,
            sending_remote_rtp_parameters_by_kind,
            transceivers: HashMap::new(),
            stream_id,
        }
    }

    fn parameters_for(
        &self,
        kind: MediaKind,
        codec: Option<&RtpCodecCapability>,
    ) -> Result<(RtpParameters, RtpParameters)> {
        let missing = || SfuError::Negotiation(NegotiationErrorKind::CannotProduce(kind));
        let mut local = self.sending_rtp_parameters_by_kind.get(&kind).cloned().ok_or_else(missing)?;
        let mut remote = self
            .sending_remote_rtp_parameters_by_kind
            .get(&kind)
            .cloned()
            .ok_or_else(missing)?;
        local.codecs = reduce_codecs(&local.codecs, codec)?;
        remote.codecs = reduce_codecs(&remote.codecs, codec)?;
        Ok((local, remote))
    }

    /// Negotiate a new outgoing track and return its local id.
    pub async fn send(&mut self, options: HandlerSendOptions) -> Result<HandlerSendResult> {
        self.core.ensure_open()?;
        let track = options.track;
        let kind = track.kind();
        if track.is_ended() {
            return Err(SfuError::Negotiation(NegotiationErrorKind::TrackEnded));
        }
        let (mut sending, sending_remote) = self.parameters_for(kind, options.codec.as_ref())?;
        tracing::debug!(transport_id = %self.core.transport_id, %kind, track_id = %track.id(), "send");

        let section_idx = self.core.remote_sdp.get_next_media_section_idx();
        let transceiver = self
            .core
            .pc
            .add_transceiver(TransceiverInit {
                kind,
                track: Some(track.clone()),
                direction: Direction::SendOnly,
                stream_ids: vec![self.stream_id.clone()],
                send_encodings: options.encodings.clone(),
            })
            .await?;

        let requested_encodings = options.encodings;
        let codec_options = options.codec_options;
        let negotiated = async {
            let offer = self.core.pc.create_offer(OfferOptions::default()).await?;
            let offer_doc = sdp::parse(&offer)?;
            self.core.setup_if_needed(&offer_doc).await?;
            self.core.pc.set_local_description(SdpType::Offer, &offer).await?;

            let local_id = self
                .core
                .transceiver_by_id(transceiver)
                .and_then(|t| t.mid)
                .ok_or_else(|| transceiver_not_found(&transceiver.to_string()))?;
            sending.mid = Some(local_id.clone());

            let local_doc = self.core.current_local_description()?;
            let offer_media = find_media(&local_doc.media, &local_id, section_idx.idx)?;
            sending.rtcp.cname = Some(get_cname(offer_media)).filter(|cname| !cname.is_empty());
            sending.encodings = resolve_encodings(offer_media, requested_encodings)?;
            if sending.encodings.len() > 1
                && let Some(codec) = sending.codecs.first()
                && TEMPORAL_LAYER_CODECS.contains(&codec.mime_type.to_ascii_lowercase().as_str())
            {
                for encoding in &mut sending.encodings {
                    encoding.scalability_mode = Some(DEFAULT_SCALABILITY_MODE.to_string());
                }
            }

            self.core.remote_sdp.send(SendSection {
                offer_media,
                reuse_mid: section_idx.reuse_mid.as_deref(),
                offer_rtp_parameters: &mut sending,
                answer_rtp_parameters: &sending_remote,
                codec_options: codec_options.as_ref(),
            })?;
            let answer = self.core.remote_sdp.get_sdp()?;
            tracing::debug!(transport_id = %self.core.transport_id, mid = %local_id, "set remote answer");
            self.core.pc.set_remote_description(SdpType::Answer, &answer).await?;
            Ok::<_, SfuError>(local_id)
        }
        .await;

        match negotiated {
            Ok(local_id) => {
                self.transceivers.insert(local_id.clone(), transceiver);
                Ok(HandlerSendResult {
                    local_id,
                    rtp_parameters: sending,
                })
            }
            Err(err) => {
                tracing::warn!(transport_id = %self.core.transport_id, %transceiver, error = %err, "send failed, stopping transceiver");
                self.release_transceiver(transceiver).await;
                Err(err)
            }
        }
    }

    /// Detach the track of a transceiver that never got a local id.
    async fn release_transceiver(&self, transceiver: TransceiverId) {
        let released = async {
            self.core.pc.remove_track(transceiver).await?;
            self.core.pc.stop_transceiver(transceiver).await
        }
        .await;
        if let Err(err) = released {
            tracing::warn!(transport_id = %self.core.transport_id, %transceiver, error = %err, "stop transceiver failed");
        }
    }

    /// Detach the track and close (or disable) its media section.
    pub async fn stop_sending(&mut self, local_id: &str) -> Result<()> {
        self.core.ensure_open()?;
        let transceiver = *self
            .transceivers
            .get(local_id)
            .ok_or_else(|| transceiver_not_found(local_id))?;
        tracing::debug!(transport_id = %self.core.transport_id, %local_id, "stop sending");

        self.core.pc.replace_sender_track(transceiver, None).await?;
        self.core.pc.remove_track(transceiver).await?;
        if self.core.remote_sdp.close_media_section(local_id)? {
            self.core.pc.stop_transceiver(transceiver).await?;
        }

        let offer = self.core.pc.create_offer(OfferOptions::default()).await?;
        self.core.pc.set_local_description(SdpType::Offer, &offer).await?;
        let answer = self.core.remote_sdp.get_sdp()?;
        self.core.pc.set_remote_description(SdpType::Answer, &answer).await?;

        self.transceivers.remove(local_id);
        Ok(())
    }

    pub async fn replace_track(&mut self, local_id: &str, track: Option<TrackRef>) -> Result<()> {
        self.core.ensure_open()?;
        let transceiver = *self
            .transceivers
            .get(local_id)
            .ok_or_else(|| transceiver_not_found(local_id))?;
        tracing::debug!(transport_id = %self.core.transport_id, %local_id, has_track = track.is_some(), "replace track");
        self.core.pc.replace_sender_track(transceiver, track).await
    }

    /// Activate encodings `0..=layer`, deactivate the rest.
    pub async fn set_max_spatial_layer(
        &mut self,
        local_id: &str,
        layer: u8,
        encoding_count: usize,
    ) -> Result<()> {
        self.core.ensure_open()?;
        let transceiver = *self
            .transceivers
            .get(local_id)
            .ok_or_else(|| transceiver_not_found(local_id))?;
        let active: Vec<bool> = (0..encoding_count).map(|idx| idx <= usize::from(layer)).collect();
        tracing::debug!(transport_id = %self.core.transport_id, %local_id, layer, "set max spatial layer");
        self.core.pc.set_sender_active_encodings(transceiver, &active).await
    }

    pub async fn get_sender_stats(&self, local_id: &str) -> Result<StatsReport> {
        self.core.ensure_open()?;
        let transceiver = *self
            .transceivers
            .get(local_id)
            .ok_or_else(|| transceiver_not_found(local_id))?;
        self.core.pc.get_sender_stats(transceiver).await
    }
}

#[async_trait]
impl Negotiable for SendHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    async fn renegotiate(&mut self, ice_restart: bool) -> Result<()> {
        let offer = self.core.pc.create_offer(OfferOptions { ice_restart }).await?;
        self.core.pc.set_local_description(SdpType::Offer, &offer).await?;
        let answer = self.core.remote_sdp.get_sdp()?;
        self.core.pc.set_remote_description(SdpType::Answer, &answer).await?;
        tracing::debug!(transport_id = %self.core.transport_id, ice_restart, "send renegotiated");
        Ok(())
    }
}

/// Section of the applied offer for `mid`, falling back to the expected
/// position.
fn find_media<'a>(media: &'a [MediaDescription], mid: &str, idx: usize) -> Result<&'a MediaDescription> {
    media
        .iter()
        .find(|m| m.mid.as_deref() == Some(mid))
        .or_else(|| media.get(idx))
        .ok_or_else(|| SfuError::Negotiation(NegotiationErrorKind::MediaSectionNotFound(mid.to_string())))
}

/// Final encodings for a new sender.
///
/// No caller encodings: whatever the offer announced. One: the offered
/// encodings with the caller's explicit fields laid over the first. More
/// than one: the caller's list as given.
fn resolve_encodings(
    offer_media: &MediaDescription,
    mut requested: Vec<RtpEncodingParameters>,
) -> Result<Vec<RtpEncodingParameters>> {
    if requested.len() > 1 {
        return Ok(requested);
    }
    let mut encodings = get_rtp_encodings(offer_media)?;
    if let Some(wanted) = requested.pop()
        && let Some(first) = encodings.first_mut()
    {
        overlay_encoding(first, wanted);
    }
    Ok(encodings)
}

fn overlay_encoding(target: &mut RtpEncodingParameters, wanted: RtpEncodingParameters) {
    if wanted.rid.is_some() {
        target.rid = wanted.rid;
    }
    if wanted.max_bitrate.is_some() {
        target.max_bitrate = wanted.max_bitrate;
    }
    if wanted.max_framerate.is_some() {
        target.max_framerate = wanted.max_framerate;
    }
    if wanted.scale_resolution_down_by.is_some() {
        target.scale_resolution_down_by = wanted.scale_resolution_down_by;
    }
    if wanted.network_priority.is_some() {
        target.network_priority = wanted.network_priority;
    }
    if wanted.active.is_some() {
        target.active = wanted.active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer_media() -> MediaDescription {
        let doc = sdp::parse(
            "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n\
             m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\na=mid:0\r\n\
             a=ssrc-group:FID 10 11\r\na=ssrc:10 cname:c\r\na=ssrc:11 cname:c\r\n",
        )
        .unwrap();
        doc.media.into_iter().next().unwrap()
    }

    #[test]
    fn no_requested_encodings_take_offer() {
        let encodings = resolve_encodings(&offer_media(), Vec::new()).unwrap();
        assert_eq!(encodings.len(), 1);
        assert_eq!(encodings[0].ssrc, Some(10));
        assert_eq!(encodings[0].rtx.map(|r| r.ssrc), Some(11));
    }

    #[test]
    fn single_requested_encoding_overlays_offer() {
        let wanted = RtpEncodingParameters {
            max_bitrate: Some(500_000),
            active: Some(false),
            ssrc: Some(999),
            ..Default::default()
        };
        let encodings = resolve_encodings(&offer_media(), vec![wanted]).unwrap();
        assert_eq!(encodings[0].ssrc, Some(10), "ssrc comes from the offer");
        assert_eq!(encodings[0].max_bitrate, Some(500_000));
        assert_eq!(encodings[0].active, Some(false));
    }

    #[test]
    fn several_requested_encodings_verbatim() {
        let wanted = vec![
            RtpEncodingParameters {
                rid: Some("l".into()),
                ..Default::default()
            },
            RtpEncodingParameters {
                rid: Some("h".into()),
                ..Default::default()
            },
        ];
        let encodings = resolve_encodings(&offer_media(), wanted.clone()).unwrap();
        assert_eq!(encodings, wanted);
    }

    #[test]
    fn media_lookup_by_mid_then_index() {
        let media = vec![offer_media()];
        assert!(find_media(&media, "0", 5).is_ok());
        assert!(find_media(&media, "x", 0).is_ok());
        assert!(find_media(&media, "x", 1).is_err());
    }
}
