//! ICE server configuration handed to the negotiation endpoint.

use serde::{Deserialize, Serialize};

/// A single STUN or TURN server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// ICE servers used for every peer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    pub servers: Vec<IceServerConfig>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                IceServerConfig {
                    urls: vec!["stun:stun.l.google.com:19302".into()],
                    username: None,
                    credential: None,
                },
                IceServerConfig {
                    urls: vec!["turn:openrelay.metered.ca:80".into()],
                    username: Some("openrelayproject".into()),
                    credential: Some("openrelayproject".into()),
                },
            ],
        }
    }
}
