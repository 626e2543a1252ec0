//! Validation of capability and parameter documents.
//!
//! Each validator checks mandatory fields, rejects bad values and fills the
//! optional defaults in place. Validators stop at the first error and leave
//! the document untouched past that point. Running a validator on an
//! already validated document is a no-op.

use super::types::{
    DtlsParameters, IceCandidate, IceParameters, MediaKind, RtcpFeedback, RtcpParameters, RtpCapabilities,
    RtpCodecCapability, RtpCodecParameters, RtpEncodingParameters, RtpHeaderExtension,
    RtpHeaderExtensionParameters, RtpParameters, SctpCapabilities, SctpStreamParameters,
};
use crate::error::{Result, SfuError};
use crate::sdp::{CodecParameters, Direction, ParameterValue};

pub fn validate_rtp_capabilities(caps: &mut RtpCapabilities) -> Result<()> {
    for codec in &mut caps.codecs {
        validate_rtp_codec_capability(codec)?;
    }
    for ext in &mut caps.header_extensions {
        validate_rtp_header_extension(ext)?;
    }
    Ok(())
}

pub fn validate_rtp_codec_capability(codec: &mut RtpCodecCapability) -> Result<()> {
    let kind = mime_kind("codec.mimeType", &codec.mime_type)?;
    if kind != codec.kind {
        return Err(SfuError::invalid(
            "codec.kind",
            format!("kind {} does not match mimeType {}", codec.kind, codec.mime_type),
        ));
    }
    if codec.clock_rate == 0 {
        return Err(SfuError::invalid("codec.clockRate", "must be positive"));
    }
    codec.channels = default_channels(kind, codec.channels);
    validate_codec_parameters(&codec.parameters)?;
    for fb in &mut codec.rtcp_feedback {
        validate_rtcp_feedback(fb)?;
    }
    Ok(())
}

pub fn validate_rtp_header_extension(ext: &mut RtpHeaderExtension) -> Result<()> {
    if ext.uri.is_empty() {
        return Err(SfuError::missing("headerExtension.uri"));
    }
    if ext.preferred_id == 0 {
        return Err(SfuError::invalid("headerExtension.preferredId", "must be positive"));
    }
    ext.direction.get_or_insert(Direction::SendRecv);
    Ok(())
}

pub fn validate_rtcp_feedback(fb: &mut RtcpFeedback) -> Result<()> {
    if fb.kind.is_empty() {
        return Err(SfuError::missing("rtcpFeedback.type"));
    }
    if fb.parameter.as_deref() == Some("") {
        fb.parameter = None;
    }
    Ok(())
}

pub fn validate_rtp_parameters(params: &mut RtpParameters) -> Result<()> {
    if params.mid.as_deref() == Some("") {
        return Err(SfuError::invalid("rtpParameters.mid", "empty mid"));
    }
    for codec in &mut params.codecs {
        validate_rtp_codec_parameters(codec)?;
    }
    for ext in &mut params.header_extensions {
        validate_rtp_header_extension_parameters(ext)?;
    }
    for encoding in &mut params.encodings {
        validate_rtp_encoding_parameters(encoding)?;
    }
    validate_rtcp_parameters(&mut params.rtcp)
}

pub fn validate_rtp_codec_parameters(codec: &mut RtpCodecParameters) -> Result<()> {
    let kind = mime_kind("codec.mimeType", &codec.mime_type)?;
    if codec.clock_rate == 0 {
        return Err(SfuError::invalid("codec.clockRate", "must be positive"));
    }
    codec.channels = default_channels(kind, codec.channels);
    validate_codec_parameters(&codec.parameters)?;
    for fb in &mut codec.rtcp_feedback {
        validate_rtcp_feedback(fb)?;
    }
    Ok(())
}

pub fn validate_rtp_header_extension_parameters(ext: &mut RtpHeaderExtensionParameters) -> Result<()> {
    if ext.uri.is_empty() {
        return Err(SfuError::missing("headerExtension.uri"));
    }
    if ext.id == 0 {
        return Err(SfuError::invalid("headerExtension.id", "must be positive"));
    }
    validate_codec_parameters(&ext.parameters)
}

pub fn validate_rtp_encoding_parameters(encoding: &mut RtpEncodingParameters) -> Result<()> {
    if encoding.rid.as_deref() == Some("") {
        return Err(SfuError::invalid("encoding.rid", "empty rid"));
    }
    if encoding.scalability_mode.as_deref() == Some("") {
        return Err(SfuError::invalid("encoding.scalabilityMode", "empty scalability mode"));
    }
    if let Some(scale) = encoding.scale_resolution_down_by
        && scale < 1.0
    {
        return Err(SfuError::invalid(
            "encoding.scaleResolutionDownBy",
            format!("{scale} is lower than 1"),
        ));
    }
    encoding.dtx.get_or_insert(false);
    Ok(())
}

pub fn validate_rtcp_parameters(rtcp: &mut RtcpParameters) -> Result<()> {
    rtcp.reduced_size.get_or_insert(true);
    Ok(())
}

pub fn validate_ice_parameters(params: &IceParameters) -> Result<()> {
    if params.username_fragment.is_empty() {
        return Err(SfuError::missing("iceParameters.usernameFragment"));
    }
    if params.password.is_empty() {
        return Err(SfuError::missing("iceParameters.password"));
    }
    Ok(())
}

pub fn validate_ice_candidates(candidates: &[IceCandidate]) -> Result<()> {
    for candidate in candidates {
        if candidate.foundation.is_empty() {
            return Err(SfuError::missing("iceCandidate.foundation"));
        }
        if candidate.address.is_empty() {
            return Err(SfuError::missing("iceCandidate.address"));
        }
        if candidate.port == 0 {
            return Err(SfuError::invalid("iceCandidate.port", "must be positive"));
        }
    }
    Ok(())
}

pub fn validate_dtls_parameters(params: &DtlsParameters) -> Result<()> {
    if params.role.is_none() {
        return Err(SfuError::missing("dtlsParameters.role"));
    }
    if params.fingerprints.is_empty() {
        return Err(SfuError::missing("dtlsParameters.fingerprints"));
    }
    for fingerprint in &params.fingerprints {
        if fingerprint.algorithm.is_empty() {
            return Err(SfuError::missing("dtlsFingerprint.algorithm"));
        }
        if fingerprint.value.is_empty() {
            return Err(SfuError::missing("dtlsFingerprint.value"));
        }
    }
    Ok(())
}

pub fn validate_sctp_capabilities(caps: &SctpCapabilities) -> Result<()> {
    if caps.num_streams.os == 0 {
        return Err(SfuError::invalid("numStreams.OS", "must be positive"));
    }
    if caps.num_streams.mis == 0 {
        return Err(SfuError::invalid("numStreams.MIS", "must be positive"));
    }
    Ok(())
}

/// `ordered` defaults to true unless a lifetime or retransmit limit is set.
pub fn validate_sctp_stream_parameters(params: &mut SctpStreamParameters) -> Result<()> {
    let partial = params.max_packet_life_time.is_some() || params.max_retransmits.is_some();
    if params.max_packet_life_time.is_some() && params.max_retransmits.is_some() {
        return Err(SfuError::invalid(
            "sctpStreamParameters",
            "cannot provide both maxPacketLifeTime and maxRetransmits",
        ));
    }
    match params.ordered {
        Some(true) if partial => Err(SfuError::invalid(
            "sctpStreamParameters.ordered",
            "cannot be ordered with maxPacketLifeTime or maxRetransmits",
        )),
        Some(_) => Ok(()),
        None => {
            params.ordered = Some(!partial);
            Ok(())
        }
    }
}

fn mime_kind(field: &str, mime_type: &str) -> Result<MediaKind> {
    if mime_type.is_empty() {
        return Err(SfuError::missing(field));
    }
    MediaKind::from_mime_type(mime_type)
        .ok_or_else(|| SfuError::invalid(field, format!("'{mime_type}' is not an audio/video mime type")))
}

fn default_channels(kind: MediaKind, channels: Option<u8>) -> Option<u8> {
    match kind {
        MediaKind::Audio => Some(channels.unwrap_or(1)),
        MediaKind::Video => None,
    }
}

/// `apt` must be numeric; everything else may be text or number.
fn validate_codec_parameters(params: &CodecParameters) -> Result<()> {
    match params.get("apt") {
        Some(ParameterValue::Text(value)) => Err(SfuError::invalid(
            "codec.parameters.apt",
            format!("'{value}' is not a payload type"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationReason;
    use crate::ortc::types::from_json;
    use serde_json::json;

    fn opus() -> RtpCodecCapability {
        from_json(json!({
            "kind": "audio",
            "mimeType": "audio/opus",
            "preferredPayloadType": 100,
            "clockRate": 48000,
            "rtcpFeedback": [{ "type": "nack", "parameter": "" }]
        }))
        .unwrap()
    }

    #[test]
    fn audio_channels_default_once() {
        let mut codec = opus();
        validate_rtp_codec_capability(&mut codec).unwrap();
        assert_eq!(codec.channels, Some(1));
        assert_eq!(codec.rtcp_feedback[0].parameter, None);

        let snapshot = codec.clone();
        validate_rtp_codec_capability(&mut codec).unwrap();
        assert_eq!(codec, snapshot, "re-validation must not change anything");
    }

    #[test]
    fn video_channels_removed() {
        let mut codec: RtpCodecCapability = from_json(json!({
            "kind": "video",
            "mimeType": "video/VP8",
            "clockRate": 90000,
            "channels": 2
        }))
        .unwrap();
        validate_rtp_codec_capability(&mut codec).unwrap();
        assert_eq!(codec.channels, None);
    }

    #[test]
    fn kind_must_match_mime_type() {
        let mut codec = opus();
        codec.kind = MediaKind::Video;
        let err = validate_rtp_codec_capability(&mut codec).unwrap_err();
        assert!(matches!(err, SfuError::Validation { ref field, .. } if field == "codec.kind"));
    }

    #[test]
    fn parameters_defaults_are_stable() {
        let mut params: RtpParameters = from_json(json!({
            "codecs": [{ "mimeType": "audio/opus", "payloadType": 111, "clockRate": 48000 }],
            "headerExtensions": [{ "uri": "urn:ietf:params:rtp-hdrext:sdes:mid", "id": 1 }],
            "encodings": [{ "ssrc": 1111 }],
            "rtcp": { "cname": "abc" }
        }))
        .unwrap();
        validate_rtp_parameters(&mut params).unwrap();
        assert_eq!(params.encodings[0].dtx, Some(false));
        assert_eq!(params.rtcp.reduced_size, Some(true));
        assert_eq!(params.codecs[0].channels, Some(1));

        let snapshot = params.clone();
        validate_rtp_parameters(&mut params).unwrap();
        assert_eq!(params, snapshot);
    }

    #[test]
    fn explicit_reduced_size_kept() {
        let mut rtcp = RtcpParameters {
            cname: None,
            reduced_size: Some(false),
        };
        validate_rtcp_parameters(&mut rtcp).unwrap();
        assert_eq!(rtcp.reduced_size, Some(false));
    }

    #[test]
    fn empty_rid_rejected() {
        let mut encoding = RtpEncodingParameters {
            rid: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_rtp_encoding_parameters(&mut encoding).is_err());
        assert_eq!(encoding.dtx, None, "no defaults applied after an error");
    }

    #[test]
    fn header_extension_direction_default() {
        let mut ext: RtpHeaderExtension = from_json(json!({
            "kind": "video",
            "uri": "urn:3gpp:video-orientation",
            "preferredId": 4
        }))
        .unwrap();
        validate_rtp_header_extension(&mut ext).unwrap();
        assert_eq!(ext.direction, Some(Direction::SendRecv));
    }

    #[test]
    fn text_apt_rejected() {
        let mut codec: RtpCodecParameters = from_json(json!({
            "mimeType": "video/rtx",
            "payloadType": 97,
            "clockRate": 90000,
            "parameters": { "apt": "x" }
        }))
        .unwrap();
        assert!(validate_rtp_codec_parameters(&mut codec).is_err());
    }

    #[test]
    fn ice_parameters_mandatory() {
        let params = IceParameters {
            username_fragment: String::new(),
            password: "pwd".into(),
            ice_lite: None,
        };
        let err = validate_ice_parameters(&params).unwrap_err();
        assert!(matches!(
            err,
            SfuError::Validation { reason: ValidationReason::Missing, .. }
        ));
    }

    #[test]
    fn dtls_role_mandatory() {
        let params: DtlsParameters = from_json(json!({
            "fingerprints": [{ "algorithm": "sha-256", "value": "AA:BB" }]
        }))
        .unwrap();
        assert!(validate_dtls_parameters(&params).is_err());
    }

    #[test]
    fn sctp_ordered_defaults() {
        let mut reliable = SctpStreamParameters {
            stream_id: 1,
            ..Default::default()
        };
        validate_sctp_stream_parameters(&mut reliable).unwrap();
        assert_eq!(reliable.ordered, Some(true));

        let mut lossy = SctpStreamParameters {
            stream_id: 2,
            max_retransmits: Some(0),
            ..Default::default()
        };
        validate_sctp_stream_parameters(&mut lossy).unwrap();
        assert_eq!(lossy.ordered, Some(false));
        validate_sctp_stream_parameters(&mut lossy).unwrap();
        assert_eq!(lossy.ordered, Some(false));

        let mut both = SctpStreamParameters {
            stream_id: 3,
            max_retransmits: Some(1),
            max_packet_life_time: Some(100),
            ..Default::default()
        };
        assert!(validate_sctp_stream_parameters(&mut both).is_err());
    }
}
