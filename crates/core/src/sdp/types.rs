//! Typed SDP document.
//!
//! Field names follow the grammar keys (camelCase on the intermediate JSON
//! form). Anything the grammar produces that has no dedicated field is kept
//! in `extra`, so conversion to and from the generic form is lossless.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flag value of `a=rtcp-mux`.
pub const RTCP_MUX: &str = "rtcp-mux";
/// Flag value of `a=rtcp-rsize`.
pub const RTCP_RSIZE: &str = "rtcp-rsize";
/// Flag value of `a=end-of-candidates`.
pub const END_OF_CANDIDATES: &str = "end-of-candidates";
/// Flag value of `a=extmap-allow-mixed`.
pub const EXTMAP_ALLOW_MIXED: &str = "extmap-allow-mixed";
/// Flag value of `a=ice-lite`.
pub const ICE_LITE: &str = "ice-lite";

/// A full session description: session-level fields plus media sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    pub version: u32,
    pub origin: Origin,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezones: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeats: Option<String>,
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bandwidth: Vec<Bandwidth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icelite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_ufrag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_pwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msid_semantic: Option<MsidSemantic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extmap_allow_mixed: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid: Vec<InvalidLine>,
    #[serde(default)]
    pub media: Vec<MediaDescription>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    pub username: String,
    pub session_id: String,
    pub session_version: u64,
    pub net_type: String,
    pub ip_ver: u8,
    pub address: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub start: u64,
    pub stop: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub version: u8,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bandwidth {
    #[serde(rename = "type")]
    pub kind: String,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "type")]
    pub kind: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsidSemantic {
    pub semantic: String,
    pub token: String,
}

/// `a=group:<type> <mids>`, e.g. `BUNDLE 0 1 2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "type")]
    pub kind: String,
    pub mids: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidLine {
    pub value: String,
}

/// Media direction attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendRecv => "sendrecv",
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::Inactive => "inactive",
        }
    }

    /// The same direction seen from the other side.
    pub fn inverted(self) -> Self {
        match self {
            Self::SendOnly => Self::RecvOnly,
            Self::RecvOnly => Self::SendOnly,
            other => other,
        }
    }
}

/// One `m=` section with its attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaDescription {
    #[serde(rename = "type")]
    pub kind: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ports: Option<u32>,
    pub protocol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub payloads: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bandwidth: Vec<Bandwidth>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rtp: Vec<RtpMap>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fmtp: Vec<Fmtp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtcp: Option<Rtcp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rtcp_fb_trr_int: Vec<RtcpFbTrrInt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rtcp_fb: Vec<RtcpFb>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ext: Vec<ExtMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extmap_allow_mixed: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub crypto: Vec<Crypto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxptime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_ufrag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_pwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_of_candidates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_candidates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_options: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssrcs: Vec<Ssrc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssrc_groups: Vec<SsrcGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtcp_mux: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtcp_rsize: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sctpmap: Option<Sctpmap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_google_flag: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rids: Vec<Rid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulcast: Option<Simulcast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framerate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sctp_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_size: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalid: Vec<InvalidLine>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaDescription {
    /// A section with port 0 is closed (RFC 3264 §8.2).
    pub fn is_closed(&self) -> bool {
        self.port == 0
    }

    pub fn fmtp_for(&self, payload: u8) -> Option<&Fmtp> {
        self.fmtp.iter().find(|f| f.payload == payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpMap {
    pub payload: u8,
    pub codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fmtp {
    pub payload: u8,
    pub config: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rtcp {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_ver: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFbTrrInt {
    pub payload: String,
    pub value: u32,
}

/// `a=rtcp-fb:<payload|*> <type> [subtype]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFb {
    pub payload: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtMap {
    pub value: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(rename = "encrypt-uri", default, skip_serializing_if = "Option::is_none")]
    pub encrypt_uri: Option<String>,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crypto {
    pub id: u32,
    pub suite: String,
    pub config: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub foundation: String,
    pub component: u32,
    pub transport: String,
    pub priority: u64,
    pub ip: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raddr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rport: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcptype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u32>,
    #[serde(rename = "network-id", default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<u32>,
    #[serde(rename = "network-cost", default, skip_serializing_if = "Option::is_none")]
    pub network_cost: Option<u32>,
}

/// `a=ssrc:<id> <attribute>[:<value>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ssrc {
    pub id: u32,
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// `a=ssrc-group:<semantics> <ssrc> <ssrc>...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrcGroup {
    pub semantics: String,
    pub ssrcs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sctpmap {
    pub sctpmap_number: u16,
    pub app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_message_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rid {
    pub id: String,
    pub direction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulcast {
    pub dir1: String,
    pub list1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list2: Option<String>,
}
