//! Engine configuration.

use serde::Deserialize;

/// Knobs shared by the device and every transport it creates.
///
/// Deserializable from a partial document; missing fields take their
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Remote SDP origin username field (`o=<username> ...`).
    pub sdp_username: String,
    /// Remote SDP origin session id field (`o=... <session-id> ...`).
    pub sdp_session_id: String,
    /// Remote SDP session name (`s=`).
    pub sdp_session_name: String,
    /// `a=ice-options` written on every remote media section.
    pub ice_options: Option<String>,
    /// Consume the bandwidth probator on the first video consumer.
    pub enable_probator: bool,
    /// Answer `a=extmap-allow-mixed` when the local offer carries it.
    pub extmap_allow_mixed: bool,
    /// Drop a produce/stop/change request whose key is already queued.
    pub coalesce_produce_requests: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sdp_username: "sfu-client".to_string(),
            sdp_session_id: (rand::random::<u32>() % 9_000_000 + 1_000_000).to_string(),
            sdp_session_name: "-".to_string(),
            ice_options: Some("renomination".to_string()),
            enable_probator: true,
            extmap_allow_mixed: false,
            coalesce_produce_requests: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let config: EngineConfig = serde_json::from_value(serde_json::json!({
            "sdpUsername": "alice",
            "enableProbator": false
        }))
        .unwrap();
        assert_eq!(config.sdp_username, "alice");
        assert!(!config.enable_probator);
        assert_eq!(config.sdp_session_name, "-");
        assert_eq!(config.ice_options.as_deref(), Some("renomination"));
        assert!(config.coalesce_produce_requests);
    }

    #[test]
    fn session_id_is_numeric() {
        let config = EngineConfig::default();
        assert!(config.sdp_session_id.parse::<u64>().is_ok());
    }
}
