//! SDP (RFC 4566 / RFC 8866) grammar, parser and writer.
//!
//! Text is parsed in two steps: the line grammar in [`grammar`] turns each
//! line into fields of a generic JSON object, then serde maps that object
//! onto the typed [`SessionDescription`]. Writing runs the same steps in
//! reverse.
//!
//! ```text
//!   "v=0\r\no=...\r\nm=audio ..."
//!          │ transform::parse_value
//!          ▼
//!   { "version": 0, "origin": {..}, "media": [ {..} ] }
//!          │ serde_json::from_value
//!          ▼
//!   SessionDescription { media: Vec<MediaDescription>, .. }
//! ```
//!
//! `parse(write(parse(s)))` equals `parse(s)` for any input `parse` accepts.

mod grammar;
pub mod helpers;
mod params;
mod transform;
mod types;

use serde_json::Value;

use crate::error::{Result, SfuError};

pub use helpers::{
    apply_codec_parameters, extract_dtls_parameters, extract_rtp_capabilities, get_cname, get_rtp_encodings,
};
pub use params::{CodecParameters, ParameterValue, parse_params, parse_payloads, write_params};
pub use types::*;

/// Session-level lines every description must carry.
const REQUIRED_FIELDS: [(&str, &str); 4] = [("version", "v"), ("origin", "o"), ("name", "s"), ("timing", "t")];

/// Parse SDP text into a typed document.
///
/// Unknown attribute lines never fail the parse; they are kept in
/// `invalid`. A description missing `v=`, `o=`, `s=` or `t=` is rejected.
pub fn parse(sdp: &str) -> Result<SessionDescription> {
    let session = transform::parse_value(sdp);
    for (field, line) in REQUIRED_FIELDS {
        if !session.contains_key(field) {
            return Err(SfuError::missing(format!("sdp {line}= line")));
        }
    }
    tracing::trace!(media = session["media"].as_array().map_or(0, Vec::len), "parsed SDP");
    Ok(serde_json::from_value(Value::Object(session))?)
}

/// Serialize a typed document to SDP text with CRLF line endings.
pub fn write(doc: &SessionDescription) -> Result<String> {
    match serde_json::to_value(doc)? {
        Value::Object(session) => Ok(transform::write_value(&session)),
        _ => Err(SfuError::invalid("sdp", "document is not an object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_OFFER: &str = "v=0\r\n\
o=- 8327393291282306425 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
a=extmap-allow-mixed\r\n\
a=msid-semantic: WMS\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 63 9\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=candidate:1467250027 1 udp 2122260223 192.168.0.196 46243 typ host generation 0 network-id 1\r\n\
a=candidate:435653019 1 tcp 1845501695 203.0.113.5 9 typ srflx raddr 192.168.0.196 rport 9 tcptype active generation 0\r\n\
a=ice-ufrag:Oy/k\r\n\
a=ice-pwd:MuoWsXhqiyUtczZEDHm6QRJZ\r\n\
a=ice-options:trickle\r\n\
a=fingerprint:sha-256 4C:8C:24:8A:6E:1E:7C:F2:5C:F8:4B:9C:DC:1A:E2:0A\r\n\
a=setup:actpass\r\n\
a=mid:0\r\n\
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
a=extmap:2/sendonly http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time\r\n\
a=sendrecv\r\n\
a=msid:- 6a5e1b90-0b43-4d31-8a35-b8a6d1b0e1c4\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtcp-fb:111 transport-cc\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtpmap:63 red/48000/2\r\n\
a=fmtp:63 111/111\r\n\
a=rtpmap:9 G722/8000\r\n\
a=ptime:20\r\n\
a=ssrc:3735928559 cname:4TOk42mSjXCkVIa6\r\n\
a=ssrc:3735928559 msid:- 6a5e1b90\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\n\
c=IN IP4 0.0.0.0\r\n\
b=AS:2000\r\n\
a=mid:1\r\n\
a=sendonly\r\n\
a=rtcp-rsize\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtcp-fb:96 goog-remb\r\n\
a=rtcp-fb:96 nack pli\r\n\
a=rtcp-fb:96 trr-int 100\r\n\
a=rtpmap:97 rtx/90000\r\n\
a=fmtp:97 apt=96\r\n\
a=rid:h send\r\n\
a=rid:l send scale-down-by=2\r\n\
a=simulcast:send h;l\r\n\
a=ssrc-group:FID 1111 2222\r\n\
a=ssrc:1111 cname:4TOk42mSjXCkVIa6\r\n\
a=ssrc:2222 cname:4TOk42mSjXCkVIa6\r\n\
a=framerate:29.97\r\n\
a=x-custom:whatever value\r\n\
m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:2\r\n\
a=sctp-port:5000\r\n\
a=max-message-size:262144\r\n";

    #[test]
    fn parse_write_parse_is_stable() {
        let first = parse(CHROME_OFFER).unwrap();
        let written = write(&first).unwrap();
        let second = parse(&written).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn typed_fields() {
        let doc = parse(CHROME_OFFER).unwrap();
        assert_eq!(doc.origin.session_version, 2);
        assert_eq!(doc.groups[0].mids, "0 1");
        assert_eq!(doc.extmap_allow_mixed.as_deref(), Some(EXTMAP_ALLOW_MIXED));

        let audio = &doc.media[0];
        assert_eq!(audio.candidates.len(), 2);
        assert_eq!(audio.candidates[1].tcptype.as_deref(), Some("active"));
        assert_eq!(audio.candidates[0].network_id, Some(1));
        assert_eq!(audio.ext[1].direction.as_deref(), Some("sendonly"));
        assert_eq!(audio.ssrcs[0].id, 3735928559);
        assert_eq!(audio.ptime, Some(20.0));
        assert_eq!(audio.direction, Some(Direction::SendRecv));
        assert_eq!(parse_payloads(&audio.payloads), vec![111, 63, 9]);

        let video = &doc.media[1];
        assert_eq!(video.bandwidth[0].limit, 2000);
        assert_eq!(video.rtcp_fb_trr_int[0].value, 100);
        assert_eq!(video.rtcp_fb.len(), 2);
        assert_eq!(video.rids[1].params.as_deref(), Some("scale-down-by=2"));
        assert_eq!(video.simulcast.as_ref().map(|s| s.list1.as_str()), Some("h;l"));
        assert_eq!(video.framerate, Some(29.97));
        assert_eq!(video.invalid[0].value, "x-custom:whatever value");

        let data = &doc.media[2];
        assert_eq!(data.sctp_port, Some(5000));
        assert_eq!(data.max_message_size, Some(262144));
    }

    #[test]
    fn written_text_layout() {
        let doc = parse(CHROME_OFFER).unwrap();
        let text = write(&doc).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(&lines[..4], ["v=0", "o=- 8327393291282306425 2 IN IP4 127.0.0.1", "s=-", "t=0 0"]);
        assert_eq!(lines.last(), Some(&""), "every line ends with CRLF");
        assert!(text.contains("m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n"));
        assert!(text.contains("a=candidate:435653019 1 tcp 1845501695 203.0.113.5 9 typ srflx raddr 192.168.0.196 rport 9 tcptype active generation 0\r\n"));
        assert!(text.contains("a=extmap:2/sendonly http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time\r\n"));
        assert!(text.contains("a=framerate:29.97\r\n"));

        let m_video = text.find("m=video").unwrap();
        let c_video = text[m_video..].find("c=IN IP4").unwrap();
        let b_video = text[m_video..].find("b=AS:2000").unwrap();
        assert!(c_video < b_video, "media lines follow i c b a order");
    }

    #[test]
    fn missing_origin_rejected() {
        let err = parse("v=0\r\ns=-\r\nt=0 0\r\n").unwrap_err();
        assert!(err.to_string().contains("o="), "{err}");
    }

    #[test]
    fn lf_only_input_accepted() {
        let doc = parse("v=0\no=- 1 1 IN IP4 0.0.0.0\ns=test\nt=0 0\nm=audio 9 RTP/AVP 0\na=mid:a\n").unwrap();
        assert_eq!(doc.name, "test");
        assert_eq!(doc.media[0].mid.as_deref(), Some("a"));
    }

    #[test]
    fn session_version_above_i64_range() {
        let text = "v=0\r\no=- 1 18446744073709551615 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n";
        let doc = parse(text).unwrap();
        assert_eq!(doc.origin.session_version, u64::MAX);
        assert!(write(&doc).unwrap().contains("o=- 1 18446744073709551615 IN IP4 0.0.0.0\r\n"));
    }
}
