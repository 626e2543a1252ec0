//! Extraction of ORTC objects from parsed local descriptions.

use super::params::{ParameterValue, parse_params, write_params};
use super::types::{MediaDescription, SessionDescription};
use crate::error::{NegotiationErrorKind, Result, SfuError};
use crate::ortc::{
    DtlsFingerprint, DtlsParameters, DtlsRole, MediaKind, RtcpFeedback, RtpCapabilities, RtpCodecCapability,
    RtpEncodingParameters, RtpHeaderExtension, RtpParameters, RtxParameters, is_rtx_mime_type,
};

/// Native capabilities advertised by a local offer.
///
/// Only the first audio and the first video section are inspected.
/// `rtcp-fb:*` entries apply to every non-RTX codec of the section's kind,
/// and encrypted header extensions are skipped.
pub fn extract_rtp_capabilities(doc: &SessionDescription) -> RtpCapabilities {
    let mut codecs: Vec<RtpCodecCapability> = Vec::new();
    let mut header_extensions = Vec::new();
    let mut seen_audio = false;
    let mut seen_video = false;

    for media in &doc.media {
        let kind = match MediaKind::from_sdp(&media.kind) {
            Some(MediaKind::Audio) if !seen_audio => {
                seen_audio = true;
                MediaKind::Audio
            }
            Some(MediaKind::Video) if !seen_video => {
                seen_video = true;
                MediaKind::Video
            }
            _ => continue,
        };

        for rtp in &media.rtp {
            let Some(clock_rate) = rtp.rate else {
                continue;
            };
            let codec = RtpCodecCapability {
                kind,
                mime_type: format!("{kind}/{}", rtp.codec),
                preferred_payload_type: Some(rtp.payload),
                clock_rate,
                channels: rtp.encoding,
                parameters: Default::default(),
                rtcp_feedback: Vec::new(),
            };
            match codecs
                .iter_mut()
                .find(|c| c.preferred_payload_type == Some(rtp.payload))
            {
                Some(existing) => *existing = codec,
                None => codecs.push(codec),
            }
        }

        for fmtp in &media.fmtp {
            let Some(codec) = codecs
                .iter_mut()
                .find(|c| c.preferred_payload_type == Some(fmtp.payload))
            else {
                continue;
            };
            let mut parameters = parse_params(&fmtp.config);
            if let Some(ParameterValue::Number(n)) = parameters.get("profile-level-id") {
                let text = n.to_string();
                parameters.insert("profile-level-id", text);
            }
            codec.parameters = parameters;
        }

        for fb in &media.rtcp_fb {
            let feedback = RtcpFeedback {
                kind: fb.kind.clone(),
                parameter: fb.subtype.clone().filter(|s| !s.is_empty()),
            };
            if fb.payload == "*" {
                for codec in codecs
                    .iter_mut()
                    .filter(|c| c.kind == kind && !is_rtx_mime_type(&c.mime_type))
                {
                    codec.rtcp_feedback.push(feedback.clone());
                }
            } else if let Ok(payload) = fb.payload.parse::<u8>()
                && let Some(codec) = codecs
                    .iter_mut()
                    .find(|c| c.preferred_payload_type == Some(payload))
            {
                codec.rtcp_feedback.push(feedback);
            }
        }

        for ext in &media.ext {
            if ext.encrypt_uri.is_some() {
                continue;
            }
            header_extensions.push(RtpHeaderExtension {
                kind,
                uri: ext.uri.clone(),
                preferred_id: ext.value,
                preferred_encrypt: false,
                direction: None,
            });
        }
    }

    RtpCapabilities {
        codecs,
        header_extensions,
    }
}

/// DTLS parameters of the first active media section.
///
/// `a=setup` maps `active` to client, `passive` to server and `actpass` to
/// auto. The fingerprint is taken from the section or, failing that, from
/// the session level.
pub fn extract_dtls_parameters(doc: &SessionDescription) -> Result<DtlsParameters> {
    let media = doc
        .media
        .iter()
        .find(|m| m.ice_ufrag.is_some() && m.port != 0)
        .ok_or(SfuError::Negotiation(NegotiationErrorKind::NoActiveMediaSection))?;

    let fingerprint = media
        .fingerprint
        .as_ref()
        .or(doc.fingerprint.as_ref())
        .ok_or_else(|| SfuError::missing("sdp.fingerprint"))?;

    let role = match media.setup.as_deref().or(doc.setup.as_deref()) {
        Some("active") => Some(DtlsRole::Client),
        Some("passive") => Some(DtlsRole::Server),
        Some("actpass") => Some(DtlsRole::Auto),
        _ => None,
    };

    Ok(DtlsParameters {
        role,
        fingerprints: vec![DtlsFingerprint {
            algorithm: fingerprint.kind.clone(),
            value: fingerprint.hash.clone(),
        }],
    })
}

/// First `a=ssrc:<id> cname:<value>` of the section, or an empty string.
pub fn get_cname(media: &MediaDescription) -> String {
    media
        .ssrcs
        .iter()
        .find(|ssrc| ssrc.attribute == "cname")
        .and_then(|ssrc| ssrc.value.clone())
        .unwrap_or_default()
}

/// Encodings announced by a local offer section.
///
/// Every `FID` group pairs a media SSRC with its RTX SSRC; SSRCs outside
/// any group are sent without RTX.
pub fn get_rtp_encodings(media: &MediaDescription) -> Result<Vec<RtpEncodingParameters>> {
    let mut ssrcs: Vec<u32> = Vec::new();
    for line in &media.ssrcs {
        if !ssrcs.contains(&line.id) {
            ssrcs.push(line.id);
        }
    }
    if ssrcs.is_empty() {
        return Err(SfuError::Negotiation(NegotiationErrorKind::NoSsrcLines));
    }

    let mut pairs: Vec<(u32, Option<u32>)> = Vec::new();
    for group in media.ssrc_groups.iter().filter(|g| g.semantics == "FID") {
        let mut ids = group.ssrcs.split_whitespace().filter_map(|id| id.parse::<u32>().ok());
        let (Some(ssrc), Some(rtx)) = (ids.next(), ids.next()) else {
            continue;
        };
        if ssrcs.contains(&ssrc) {
            ssrcs.retain(|id| *id != ssrc && *id != rtx);
            pairs.push((ssrc, Some(rtx)));
        }
    }
    pairs.extend(ssrcs.into_iter().map(|ssrc| (ssrc, None)));

    Ok(pairs
        .into_iter()
        .map(|(ssrc, rtx)| RtpEncodingParameters {
            ssrc: Some(ssrc),
            rtx: rtx.map(|ssrc| RtxParameters { ssrc }),
            ..Default::default()
        })
        .collect())
}

/// Mirror the offered opus `sprop-stereo` into the answer's `stereo`.
pub fn apply_codec_parameters(offer: &RtpParameters, answer: &mut MediaDescription) {
    for codec in &offer.codecs {
        if !codec.mime_type.eq_ignore_ascii_case("audio/opus") {
            continue;
        }
        if !answer.rtp.iter().any(|rtp| rtp.payload == codec.payload_type) {
            continue;
        }
        let Some(sprop_stereo) = codec.parameters.get("sprop-stereo") else {
            continue;
        };
        let stereo = match sprop_stereo {
            ParameterValue::Number(n) => *n != 0,
            ParameterValue::Text(s) => !s.is_empty() && s != "0",
        };

        let index = match answer.fmtp.iter().position(|f| f.payload == codec.payload_type) {
            Some(index) => index,
            None => {
                answer.fmtp.push(super::types::Fmtp {
                    payload: codec.payload_type,
                    config: String::new(),
                });
                answer.fmtp.len() - 1
            }
        };
        let fmtp = &mut answer.fmtp[index];
        let mut parameters = parse_params(&fmtp.config);
        parameters.insert("stereo", i64::from(stereo));
        fmtp.config = write_params(&parameters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::parse;

    const LOCAL_OFFER: &str = "v=0\r\n\
o=- 1 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=fingerprint:sha-256 AA:BB:CC:DD\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 0\r\n\
a=ice-ufrag:uf1\r\n\
a=ice-pwd:pw1\r\n\
a=setup:actpass\r\n\
a=mid:0\r\n\
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
a=extmap:9 urn:ietf:params:rtp-hdrext:encrypt urn:ietf:params:rtp-hdrext:toffset\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtcp-fb:111 transport-cc\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtpmap:0 PCMU/8000\r\n\
a=ssrc:111 cname:abc\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 97 102\r\n\
a=mid:1\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtcp-fb:* nack\r\n\
a=rtcp-fb:96 nack pli\r\n\
a=rtpmap:97 rtx/90000\r\n\
a=fmtp:97 apt=96\r\n\
a=rtpmap:102 H264/90000\r\n\
a=fmtp:102 packetization-mode=1;profile-level-id=640032\r\n\
a=ssrc-group:FID 1000 1001\r\n\
a=ssrc:1000 cname:xyz\r\n\
a=ssrc:1001 cname:xyz\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 98\r\n\
a=mid:2\r\n\
a=rtpmap:98 VP9/90000\r\n";

    #[test]
    fn capabilities_from_first_sections_only() {
        let caps = extract_rtp_capabilities(&parse(LOCAL_OFFER).unwrap());
        let mimes: Vec<_> = caps.codecs.iter().map(|c| c.mime_type.as_str()).collect();
        assert_eq!(mimes, ["audio/opus", "audio/PCMU", "video/VP8", "video/rtx", "video/H264"]);
        assert_eq!(caps.codecs[0].channels, Some(2));
        assert_eq!(caps.codecs[3].parameters.get_i64("apt"), Some(96));
        assert_eq!(
            caps.codecs[4].parameters.get("profile-level-id"),
            Some(&ParameterValue::Text("640032".into())),
            "profile-level-id is always text"
        );
        assert_eq!(caps.header_extensions.len(), 1, "encrypted extension skipped");
    }

    #[test]
    fn wildcard_feedback_skips_rtx() {
        let caps = extract_rtp_capabilities(&parse(LOCAL_OFFER).unwrap());
        let vp8 = &caps.codecs[2];
        assert_eq!(
            vp8.rtcp_feedback,
            vec![RtcpFeedback::new("nack", None), RtcpFeedback::new("nack", Some("pli"))]
        );
        assert!(caps.codecs[3].rtcp_feedback.is_empty());
        assert_eq!(caps.codecs[4].rtcp_feedback, vec![RtcpFeedback::new("nack", None)]);
    }

    #[test]
    fn dtls_from_session_fingerprint() {
        let dtls = extract_dtls_parameters(&parse(LOCAL_OFFER).unwrap()).unwrap();
        assert_eq!(dtls.role, Some(DtlsRole::Auto));
        assert_eq!(dtls.fingerprints[0].algorithm, "sha-256");
        assert_eq!(dtls.fingerprints[0].value, "AA:BB:CC:DD");
    }

    #[test]
    fn dtls_requires_active_section() {
        let doc = parse("v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\nm=audio 0 RTP/AVP 0\r\na=ice-ufrag:x\r\n").unwrap();
        let err = extract_dtls_parameters(&doc).unwrap_err();
        assert!(matches!(
            err,
            SfuError::Negotiation(NegotiationErrorKind::NoActiveMediaSection)
        ));
    }

    #[test]
    fn encodings_pair_fid_groups() {
        let doc = parse(LOCAL_OFFER).unwrap();
        let encodings = get_rtp_encodings(&doc.media[1]).unwrap();
        assert_eq!(encodings.len(), 1);
        assert_eq!(encodings[0].ssrc, Some(1000));
        assert_eq!(encodings[0].rtx, Some(RtxParameters { ssrc: 1001 }));
        assert_eq!(get_cname(&doc.media[1]), "xyz");

        let audio = get_rtp_encodings(&doc.media[0]).unwrap();
        assert_eq!(audio[0].ssrc, Some(111));
        assert_eq!(audio[0].rtx, None);

        let err = get_rtp_encodings(&doc.media[2]).unwrap_err();
        assert!(matches!(err, SfuError::Negotiation(NegotiationErrorKind::NoSsrcLines)));
        assert_eq!(get_cname(&doc.media[2]), "");
    }

    #[test]
    fn sprop_stereo_mirrored() {
        let mut doc = parse(LOCAL_OFFER).unwrap();
        let offer: RtpParameters = crate::ortc::from_json(serde_json::json!({
            "codecs": [{
                "mimeType": "audio/opus", "payloadType": 111, "clockRate": 48000, "channels": 2,
                "parameters": { "sprop-stereo": 1 }
            }]
        }))
        .unwrap();
        apply_codec_parameters(&offer, &mut doc.media[0]);
        let params = parse_params(&doc.media[0].fmtp[0].config);
        assert_eq!(params.get_i64("stereo"), Some(1));
        assert_eq!(params.get_i64("useinbandfec"), Some(1));
    }
}
