//! Requests the engine makes to the signaling server.
//!
//! Framing is up to the application; the payloads are the JSON documents
//! the server expects (camelCase).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ortc::{DtlsParameters, IceParameters, MediaKind, RtpParameters};
use crate::peer::IceServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportDirection {
    Send,
    Recv,
}

impl TransportDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Recv => "recv",
        }
    }
}

/// `connect-transport`: the local DTLS parameters, sent once per transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTransportRequest {
    pub transport_id: String,
    pub direction: TransportDirection,
    pub dtls_parameters: DtlsParameters,
}

/// `send-track`: announce a new producer. The server answers with the
/// producer id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTrackRequest {
    pub transport_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    #[serde(default)]
    pub app_data: serde_json::Value,
}

/// `resume-track`: tell the server a consumer is ready for media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeTrackRequest {
    pub consumer_id: String,
    pub producer_id: String,
    pub kind: MediaKind,
}

/// Answer to `restart-ice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartIceResponse {
    pub ice_parameters: IceParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_servers: Option<Vec<IceServer>>,
}

#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn connect_transport(&self, request: ConnectTransportRequest) -> Result<()>;
    /// Returns the server-assigned producer id.
    async fn send_track(&self, request: SendTrackRequest) -> Result<String>;
    async fn resume_track(&self, request: ResumeTrackRequest) -> Result<()>;
    async fn restart_ice(&self, direction: TransportDirection) -> Result<RestartIceResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn restart_ice_response_from_server_json() {
        let response: RestartIceResponse = serde_json::from_value(json!({
            "iceParameters": { "usernameFragment": "u", "password": "p", "iceLite": true },
            "iceServers": [{ "urls": ["turn:turn.example.org"], "username": "x", "credential": "y" }]
        }))
        .unwrap();
        assert_eq!(response.ice_parameters.ice_lite, Some(true));
        assert_eq!(response.ice_servers.unwrap()[0].urls, vec!["turn:turn.example.org"]);
    }

    #[test]
    fn connect_request_wire_shape() {
        let request = ConnectTransportRequest {
            transport_id: "t1".into(),
            direction: TransportDirection::Recv,
            dtls_parameters: DtlsParameters {
                role: Some(crate::ortc::DtlsRole::Client),
                fingerprints: Vec::new(),
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["transportId"], "t1");
        assert_eq!(value["direction"], "recv");
        assert_eq!(value["dtlsParameters"]["role"], "client");
    }
}
