//! Capability intersection and derivation of per-direction RTP parameters.

use super::h264;
use super::types::{
    ExtendedCodec, ExtendedHeaderExtension, ExtendedRtpCapabilities, MediaKind, RtcpFeedback, RtcpParameters,
    RtpCapabilities, RtpCodecCapability, RtpCodecParameters, RtpEncodingParameters, RtpHeaderExtension,
    RtpHeaderExtensionParameters, RtpParameters, is_rtx_mime_type,
};
use crate::error::{NegotiationErrorKind, Result, SfuError};
use crate::sdp::{CodecParameters, Direction};

pub const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
pub const TRANSPORT_WIDE_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";

/// Mid of the synthetic bandwidth estimation stream.
pub const PROBATOR_MID: &str = "probator";
pub const PROBATOR_SSRC: u32 = 1234;

/// Common view over codec capabilities and codec parameters.
pub(crate) trait CodecLike {
    fn mime_type(&self) -> &str;
    fn clock_rate(&self) -> u32;
    fn channels(&self) -> Option<u8>;
    fn parameters(&self) -> &CodecParameters;
}

impl CodecLike for RtpCodecCapability {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }
    fn clock_rate(&self) -> u32 {
        self.clock_rate
    }
    fn channels(&self) -> Option<u8> {
        self.channels
    }
    fn parameters(&self) -> &CodecParameters {
        &self.parameters
    }
}

impl CodecLike for RtpCodecParameters {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }
    fn clock_rate(&self) -> u32 {
        self.clock_rate
    }
    fn channels(&self) -> Option<u8> {
        self.channels
    }
    fn parameters(&self) -> &CodecParameters {
        &self.parameters
    }
}

/// Outcome of a successful codec match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CodecMatch {
    /// H.264 only: the `profile-level-id` to use in the answer.
    pub profile_level_id: Option<String>,
}

/// Compare two codecs. `strict` adds the H.264 packetization-mode and
/// profile checks and the VP9 profile-id check.
pub(crate) fn match_codecs(a: &impl CodecLike, b: &impl CodecLike, strict: bool) -> Option<CodecMatch> {
    let mime_type = a.mime_type().to_ascii_lowercase();
    if mime_type != b.mime_type().to_ascii_lowercase()
        || a.clock_rate() != b.clock_rate()
        || a.channels() != b.channels()
    {
        return None;
    }

    let mut matched = CodecMatch::default();
    if !strict {
        return Some(matched);
    }

    match mime_type.as_str() {
        "video/h264" => {
            let a_mode = a.parameters().get_i64("packetization-mode").unwrap_or(0);
            let b_mode = b.parameters().get_i64("packetization-mode").unwrap_or(0);
            if a_mode != b_mode {
                return None;
            }
            if !h264::is_same_profile(a.parameters(), b.parameters()) {
                return None;
            }
            matched.profile_level_id =
                h264::generate_profile_level_id_for_answer(a.parameters(), b.parameters()).ok()?;
        }
        "video/vp9" => {
            let a_profile = a.parameters().get_i64("profile-id").unwrap_or(0);
            let b_profile = b.parameters().get_i64("profile-id").unwrap_or(0);
            if a_profile != b_profile {
                return None;
            }
        }
        _ => {}
    }
    Some(matched)
}

/// Feedback entries of `a` that `b` also declares.
pub fn reduce_rtcp_feedback(a: &[RtcpFeedback], b: &[RtcpFeedback]) -> Vec<RtcpFeedback> {
    a.iter()
        .filter_map(|fb_a| {
            b.iter().find(|fb_b| {
                fb_a.kind == fb_b.kind
                    && (fb_a.parameter == fb_b.parameter
                        || (fb_a.parameter.as_deref().unwrap_or("").is_empty()
                            && fb_b.parameter.as_deref().unwrap_or("").is_empty()))
            })
        })
        .cloned()
        .collect()
}

fn rtx_payload_type<'a>(codecs: impl IntoIterator<Item = &'a RtpCodecCapability>, apt: u8) -> Option<u8> {
    codecs
        .into_iter()
        .find(|codec| is_rtx_mime_type(&codec.mime_type) && codec.parameters.get_i64("apt") == Some(i64::from(apt)))
        .and_then(|codec| codec.preferred_payload_type)
}

/// Intersect local (native) and remote (router) capabilities.
///
/// Codec order follows the remote capabilities. Remote codecs with no
/// local counterpart are dropped.
pub fn get_extended_rtp_capabilities(local: &RtpCapabilities, remote: &RtpCapabilities) -> ExtendedRtpCapabilities {
    let mut extended = ExtendedRtpCapabilities::default();

    for remote_codec in &remote.codecs {
        if is_rtx_mime_type(&remote_codec.mime_type) {
            continue;
        }
        let Some(remote_payload_type) = remote_codec.preferred_payload_type else {
            continue;
        };
        let Some((local_codec, matched)) = local.codecs.iter().find_map(|local_codec| {
            local_codec.preferred_payload_type?;
            match_codecs(local_codec, remote_codec, true).map(|m| (local_codec, m))
        }) else {
            tracing::debug!(mime_type = %remote_codec.mime_type, "no local codec matches remote codec");
            continue;
        };

        let mut local_parameters = local_codec.parameters.clone();
        if local_codec.mime_type.eq_ignore_ascii_case("video/h264") {
            match matched.profile_level_id {
                Some(profile_level_id) => {
                    local_parameters.insert("profile-level-id", profile_level_id);
                }
                None => {
                    local_parameters.remove("profile-level-id");
                }
            }
        }

        extended.codecs.push(ExtendedCodec {
            kind: local_codec.kind,
            mime_type: local_codec.mime_type.clone(),
            clock_rate: local_codec.clock_rate,
            channels: local_codec.channels,
            local_payload_type: local_codec.preferred_payload_type.unwrap_or_default(),
            local_rtx_payload_type: None,
            remote_payload_type,
            remote_rtx_payload_type: None,
            local_parameters,
            remote_parameters: remote_codec.parameters.clone(),
            rtcp_feedback: reduce_rtcp_feedback(&local_codec.rtcp_feedback, &remote_codec.rtcp_feedback),
        });
    }

    for codec in &mut extended.codecs {
        let local_rtx = rtx_payload_type(&local.codecs, codec.local_payload_type);
        let remote_rtx = rtx_payload_type(&remote.codecs, codec.remote_payload_type);
        if let (Some(local_rtx), Some(remote_rtx)) = (local_rtx, remote_rtx) {
            codec.local_rtx_payload_type = Some(local_rtx);
            codec.remote_rtx_payload_type = Some(remote_rtx);
        }
    }

    for remote_ext in &remote.header_extensions {
        let Some(local_ext) = local
            .header_extensions
            .iter()
            .find(|local_ext| local_ext.kind == remote_ext.kind && local_ext.uri == remote_ext.uri)
        else {
            continue;
        };
        extended.header_extensions.push(ExtendedHeaderExtension {
            kind: remote_ext.kind,
            uri: remote_ext.uri.clone(),
            send_id: local_ext.preferred_id,
            recv_id: remote_ext.preferred_id,
            encrypt: local_ext.preferred_encrypt,
            direction: remote_ext.direction.unwrap_or(Direction::SendRecv).inverted(),
        });
    }

    extended
}

/// Capabilities for receiving, from the local point of view. RTX entries
/// are synthesized next to their media codec.
pub fn get_recv_rtp_capabilities(extended: &ExtendedRtpCapabilities) -> RtpCapabilities {
    let mut caps = RtpCapabilities::default();

    for codec in &extended.codecs {
        caps.codecs.push(RtpCodecCapability {
            kind: codec.kind,
            mime_type: codec.mime_type.clone(),
            preferred_payload_type: Some(codec.remote_payload_type),
            clock_rate: codec.clock_rate,
            channels: codec.channels,
            parameters: codec.local_parameters.clone(),
            rtcp_feedback: codec.rtcp_feedback.clone(),
        });
        if let Some(rtx) = codec.remote_rtx_payload_type {
            caps.codecs.push(RtpCodecCapability {
                kind: codec.kind,
                mime_type: format!("{}/rtx", codec.kind),
                preferred_payload_type: Some(rtx),
                clock_rate: codec.clock_rate,
                channels: None,
                parameters: [("apt", codec.remote_payload_type)].into_iter().collect(),
                rtcp_feedback: Vec::new(),
            });
        }
    }

    for ext in &extended.header_extensions {
        if !matches!(ext.direction, Direction::SendRecv | Direction::RecvOnly) {
            continue;
        }
        caps.header_extensions.push(RtpHeaderExtension {
            kind: ext.kind,
            uri: ext.uri.clone(),
            preferred_id: ext.recv_id,
            preferred_encrypt: ext.encrypt,
            direction: Some(ext.direction),
        });
    }

    caps
}

#[derive(Clone, Copy)]
enum ParameterSide {
    Local,
    Remote,
}

fn sending_parameters(kind: MediaKind, extended: &ExtendedRtpCapabilities, side: ParameterSide) -> RtpParameters {
    let mut params = RtpParameters::default();

    if let Some(codec) = extended.codecs.iter().find(|codec| codec.kind == kind) {
        let parameters = match side {
            ParameterSide::Local => codec.local_parameters.clone(),
            ParameterSide::Remote => codec.remote_parameters.clone(),
        };
        params.codecs.push(RtpCodecParameters {
            mime_type: codec.mime_type.clone(),
            payload_type: codec.local_payload_type,
            clock_rate: codec.clock_rate,
            channels: codec.channels,
            parameters,
            rtcp_feedback: codec.rtcp_feedback.clone(),
        });
        if let Some(rtx) = codec.local_rtx_payload_type {
            params.codecs.push(RtpCodecParameters {
                mime_type: format!("{kind}/rtx"),
                payload_type: rtx,
                clock_rate: codec.clock_rate,
                channels: None,
                parameters: [("apt", codec.local_payload_type)].into_iter().collect(),
                rtcp_feedback: Vec::new(),
            });
        }
    }

    params.header_extensions = extended
        .header_extensions
        .iter()
        .filter(|ext| ext.kind == kind && matches!(ext.direction, Direction::SendRecv | Direction::SendOnly))
        .map(|ext| RtpHeaderExtensionParameters {
            uri: ext.uri.clone(),
            id: ext.send_id,
            encrypt: ext.encrypt,
            parameters: CodecParameters::new(),
        })
        .collect();

    reduce_congestion_control(&mut params);
    params
}

/// Parameters describing what this side sends, with local codec parameters.
pub fn get_sending_rtp_parameters(kind: MediaKind, extended: &ExtendedRtpCapabilities) -> RtpParameters {
    sending_parameters(kind, extended, ParameterSide::Local)
}

/// Like [`get_sending_rtp_parameters`] but with the codec parameters the
/// remote declared, for the answer the remote would produce.
pub fn get_sending_remote_rtp_parameters(kind: MediaKind, extended: &ExtendedRtpCapabilities) -> RtpParameters {
    sending_parameters(kind, extended, ParameterSide::Remote)
}

/// Keep at most one congestion control feedback: transport-cc when the
/// transport-wide-cc extension is negotiated, else REMB with abs-send-time,
/// else neither.
fn reduce_congestion_control(params: &mut RtpParameters) {
    let has_ext = |uri: &str| params.header_extensions.iter().any(|ext| ext.uri == uri);
    let keep: fn(&RtcpFeedback) -> bool = if has_ext(TRANSPORT_WIDE_CC_URI) {
        |fb| fb.kind != "goog-remb"
    } else if has_ext(ABS_SEND_TIME_URI) {
        |fb| fb.kind != "transport-cc"
    } else {
        |fb| fb.kind != "transport-cc" && fb.kind != "goog-remb"
    };
    for codec in &mut params.codecs {
        codec.rtcp_feedback.retain(keep);
    }
}

/// Keep the first media codec (or the one matching `preferred`) plus the
/// RTX codec that follows it.
pub fn reduce_codecs(
    codecs: &[RtpCodecParameters],
    preferred: Option<&RtpCodecCapability>,
) -> Result<Vec<RtpCodecParameters>> {
    let index = match preferred {
        None => (!codecs.is_empty()).then_some(0),
        Some(cap) => codecs
            .iter()
            .position(|codec| !codec.is_rtx() && match_codecs(codec, cap, true).is_some()),
    };
    let Some(index) = index else {
        return Err(SfuError::Negotiation(NegotiationErrorKind::NoMatchingCodec));
    };

    let mut reduced = vec![codecs[index].clone()];
    if let Some(next) = codecs.get(index + 1)
        && next.is_rtx()
        && next.parameters.get_i64("apt") == Some(i64::from(codecs[index].payload_type))
    {
        reduced.push(next.clone());
    }
    Ok(reduced)
}

/// Minimal receive parameters for the bandwidth estimation stream, derived from
/// a consumed video stream's parameters.
pub fn generate_probator_rtp_parameters(video: &RtpParameters) -> Result<RtpParameters> {
    let Some(first) = video.codecs.first() else {
        return Err(SfuError::missing("rtpParameters.codecs"));
    };
    Ok(RtpParameters {
        mid: Some(PROBATOR_MID.to_string()),
        codecs: vec![first.clone()],
        header_extensions: video
            .header_extensions
            .iter()
            .filter(|ext| ext.uri == ABS_SEND_TIME_URI || ext.uri == TRANSPORT_WIDE_CC_URI)
            .cloned()
            .collect(),
        encodings: vec![RtpEncodingParameters {
            ssrc: Some(PROBATOR_SSRC),
            ..Default::default()
        }],
        rtcp: RtcpParameters {
            cname: Some(PROBATOR_MID.to_string()),
            reduced_size: Some(true),
        },
    })
}

/// Whether a codec of this kind survived negotiation.
pub fn can_send(kind: MediaKind, extended: &ExtendedRtpCapabilities) -> bool {
    extended.codecs.iter().any(|codec| codec.kind == kind)
}

/// Whether the first media codec of `params` is one we negotiated.
pub fn can_receive(params: &RtpParameters, extended: &ExtendedRtpCapabilities) -> bool {
    params.codecs.iter().find(|codec| !codec.is_rtx()).is_some_and(|first| {
        extended
            .codecs
            .iter()
            .any(|codec| codec.remote_payload_type == first.payload_type)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ortc::types::from_json;
    use crate::sdp::ParameterValue;
    use serde_json::json;

    fn local_caps() -> RtpCapabilities {
        from_json(json!({
            "codecs": [
                { "kind": "audio", "mimeType": "audio/opus", "preferredPayloadType": 111, "clockRate": 48000, "channels": 2,
                  "parameters": { "minptime": 10, "useinbandfec": 1 },
                  "rtcpFeedback": [{ "type": "transport-cc" }] },
                { "kind": "video", "mimeType": "video/VP8", "preferredPayloadType": 96, "clockRate": 90000,
                  "rtcpFeedback": [{ "type": "nack" }, { "type": "nack", "parameter": "pli" }, { "type": "goog-remb" }, { "type": "transport-cc" }] },
                { "kind": "video", "mimeType": "video/rtx", "preferredPayloadType": 97, "clockRate": 90000, "parameters": { "apt": 96 } },
                { "kind": "video", "mimeType": "video/H264", "preferredPayloadType": 102, "clockRate": 90000,
                  "parameters": { "level-asymmetry-allowed": 1, "packetization-mode": 1, "profile-level-id": "42e01f" },
                  "rtcpFeedback": [{ "type": "nack" }] },
                { "kind": "video", "mimeType": "video/rtx", "preferredPayloadType": 103, "clockRate": 90000, "parameters": { "apt": 102 } }
            ],
            "headerExtensions": [
                { "kind": "video", "uri": TRANSPORT_WIDE_CC_URI, "preferredId": 3 },
                { "kind": "video", "uri": ABS_SEND_TIME_URI, "preferredId": 2 },
                { "kind": "audio", "uri": "urn:ietf:params:rtp-hdrext:ssrc-audio-level", "preferredId": 1 }
            ]
        }))
        .unwrap()
    }

    fn remote_caps() -> RtpCapabilities {
        from_json(json!({
            "codecs": [
                { "kind": "audio", "mimeType": "audio/opus", "preferredPayloadType": 100, "clockRate": 48000, "channels": 2,
                  "rtcpFeedback": [{ "type": "transport-cc" }] },
                { "kind": "video", "mimeType": "video/H264", "preferredPayloadType": 107, "clockRate": 90000,
                  "parameters": { "level-asymmetry-allowed": 1, "packetization-mode": 1, "profile-level-id": "42e01f" },
                  "rtcpFeedback": [{ "type": "nack" }, { "type": "transport-cc" }] },
                { "kind": "video", "mimeType": "video/rtx", "preferredPayloadType": 108, "clockRate": 90000, "parameters": { "apt": 107 } },
                { "kind": "video", "mimeType": "video/VP8", "preferredPayloadType": 101, "clockRate": 90000,
                  "rtcpFeedback": [{ "type": "nack" }, { "type": "nack", "parameter": "pli" }, { "type": "transport-cc" }] },
                { "kind": "video", "mimeType": "video/rtx", "preferredPayloadType": 102, "clockRate": 90000, "parameters": { "apt": 101 } },
                { "kind": "video", "mimeType": "video/VP9", "preferredPayloadType": 103, "clockRate": 90000 }
            ],
            "headerExtensions": [
                { "kind": "video", "uri": ABS_SEND_TIME_URI, "preferredId": 4, "direction": "sendrecv" },
                { "kind": "video", "uri": TRANSPORT_WIDE_CC_URI, "preferredId": 5, "direction": "recvonly" },
                { "kind": "audio", "uri": "urn:ietf:params:rtp-hdrext:ssrc-audio-level", "preferredId": 10 }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn codec_order_follows_remote() {
        let extended = get_extended_rtp_capabilities(&local_caps(), &remote_caps());
        let mimes: Vec<_> = extended.codecs.iter().map(|c| c.mime_type.as_str()).collect();
        assert_eq!(mimes, ["audio/opus", "video/H264", "video/VP8"], "VP9 has no local match");

        let h264 = &extended.codecs[1];
        assert_eq!(h264.local_payload_type, 102);
        assert_eq!(h264.remote_payload_type, 107);
        assert_eq!(h264.local_rtx_payload_type, Some(103));
        assert_eq!(h264.remote_rtx_payload_type, Some(108));
        assert_eq!(
            h264.local_parameters.get("profile-level-id"),
            Some(&ParameterValue::Text("42e01f".into()))
        );

        let vp8 = &extended.codecs[2];
        assert_eq!(vp8.rtcp_feedback.len(), 3, "goog-remb is not offered remotely");
    }

    #[test]
    fn header_extension_direction_inverted() {
        let extended = get_extended_rtp_capabilities(&local_caps(), &remote_caps());
        let twcc = extended
            .header_extensions
            .iter()
            .find(|e| e.uri == TRANSPORT_WIDE_CC_URI)
            .unwrap();
        assert_eq!(twcc.direction, Direction::SendOnly);
        assert_eq!(twcc.send_id, 3);
        assert_eq!(twcc.recv_id, 5);
    }

    #[test]
    fn h264_packetization_mode_mismatch() {
        let a: RtpCodecCapability = from_json(json!({
            "kind": "video", "mimeType": "video/H264", "clockRate": 90000,
            "parameters": { "packetization-mode": 1, "profile-level-id": "42e01f" }
        }))
        .unwrap();
        let mut b = a.clone();
        b.parameters.insert("packetization-mode", 0u32);
        assert!(match_codecs(&a, &b, true).is_none());
        assert!(match_codecs(&a, &b, false).is_some(), "loose matching ignores fmtp");
    }

    #[test]
    fn h264_common_profile_level_id() {
        let local: RtpCodecCapability = from_json(json!({
            "kind": "video", "mimeType": "video/H264", "clockRate": 90000,
            "parameters": { "packetization-mode": 1, "profile-level-id": "42e034" }
        }))
        .unwrap();
        let mut remote = local.clone();
        remote.parameters.insert("profile-level-id", "42e01f");
        let matched = match_codecs(&local, &remote, true).unwrap();
        assert_eq!(matched.profile_level_id.as_deref(), Some("42e01f"));
    }

    #[test]
    fn vp9_profile_checked_when_strict() {
        let a: RtpCodecCapability = from_json(json!({
            "kind": "video", "mimeType": "video/VP9", "clockRate": 90000, "parameters": { "profile-id": 0 }
        }))
        .unwrap();
        let mut b = a.clone();
        b.parameters.insert("profile-id", 2u32);
        assert!(match_codecs(&a, &b, true).is_none());
        assert!(match_codecs(&a, &b, false).is_some());
    }

    #[test]
    fn recv_capabilities_synthesize_rtx() {
        let extended = get_extended_rtp_capabilities(&local_caps(), &remote_caps());
        let recv = get_recv_rtp_capabilities(&extended);
        let rtx = recv.codecs.iter().find(|c| c.preferred_payload_type == Some(108)).unwrap();
        assert_eq!(rtx.mime_type, "video/rtx");
        assert_eq!(rtx.parameters.get_i64("apt"), Some(107));
        assert!(
            recv.header_extensions.iter().all(|e| e.uri != TRANSPORT_WIDE_CC_URI),
            "sendonly extensions are not receivable"
        );
    }

    #[test]
    fn sending_parameters_pick_first_codec_and_reduce_feedback() {
        let extended = get_extended_rtp_capabilities(&local_caps(), &remote_caps());
        let params = get_sending_rtp_parameters(MediaKind::Video, &extended);
        assert_eq!(params.codecs.len(), 2);
        assert_eq!(params.codecs[0].mime_type, "video/H264");
        assert_eq!(params.codecs[1].parameters.get_i64("apt"), Some(102));
        assert!(params.header_extensions.iter().any(|e| e.uri == TRANSPORT_WIDE_CC_URI));
        assert!(params.codecs[0].rtcp_feedback.iter().all(|fb| fb.kind != "goog-remb"));

        let remote = get_sending_remote_rtp_parameters(MediaKind::Video, &extended);
        assert_eq!(remote.codecs[0].parameters.get_i64("packetization-mode"), Some(1));
    }

    #[test]
    fn remb_kept_without_transport_cc_extension() {
        let mut params = RtpParameters {
            codecs: vec![RtpCodecParameters {
                mime_type: "video/VP8".into(),
                payload_type: 96,
                clock_rate: 90000,
                channels: None,
                parameters: CodecParameters::new(),
                rtcp_feedback: vec![RtcpFeedback::new("goog-remb", None), RtcpFeedback::new("transport-cc", None)],
            }],
            header_extensions: vec![RtpHeaderExtensionParameters {
                uri: ABS_SEND_TIME_URI.into(),
                id: 2,
                encrypt: false,
                parameters: CodecParameters::new(),
            }],
            ..Default::default()
        };
        reduce_congestion_control(&mut params);
        assert_eq!(params.codecs[0].rtcp_feedback, vec![RtcpFeedback::new("goog-remb", None)]);

        params.header_extensions.clear();
        params.codecs[0].rtcp_feedback.push(RtcpFeedback::new("transport-cc", None));
        reduce_congestion_control(&mut params);
        assert!(params.codecs[0].rtcp_feedback.is_empty());
    }

    #[test]
    fn probator_parameters() {
        let extended = get_extended_rtp_capabilities(&local_caps(), &remote_caps());
        let video = get_sending_rtp_parameters(MediaKind::Video, &extended);
        let probator = generate_probator_rtp_parameters(&video).unwrap();
        assert_eq!(probator.mid.as_deref(), Some(PROBATOR_MID));
        assert_eq!(probator.codecs.len(), 1);
        assert_eq!(probator.codecs[0], video.codecs[0], "first codec kept as is");
        assert_eq!(probator.encodings[0].ssrc, Some(PROBATOR_SSRC));
        assert_eq!(probator.rtcp.cname.as_deref(), Some("probator"));
        assert!(
            probator
                .header_extensions
                .iter()
                .all(|e| e.uri == ABS_SEND_TIME_URI || e.uri == TRANSPORT_WIDE_CC_URI)
        );
    }

    #[test]
    fn reduce_codecs_keeps_rtx_pair() {
        let extended = get_extended_rtp_capabilities(&local_caps(), &remote_caps());
        let video = get_sending_rtp_parameters(MediaKind::Video, &extended);
        assert_eq!(reduce_codecs(&video.codecs, None).unwrap().len(), 2);

        let vp9: RtpCodecCapability = from_json(json!({
            "kind": "video", "mimeType": "video/VP9", "clockRate": 90000
        }))
        .unwrap();
        let err = reduce_codecs(&video.codecs, Some(&vp9)).unwrap_err();
        assert!(matches!(err, SfuError::Negotiation(NegotiationErrorKind::NoMatchingCodec)));
    }

    #[test]
    fn send_and_receive_checks() {
        let extended = get_extended_rtp_capabilities(&local_caps(), &remote_caps());
        assert!(can_send(MediaKind::Audio, &extended));

        let mut params = get_sending_remote_rtp_parameters(MediaKind::Video, &extended);
        params.codecs[0].payload_type = 107;
        assert!(can_receive(&params, &extended));
        params.codecs[0].payload_type = 103;
        assert!(!can_receive(&params, &extended));
    }
}
