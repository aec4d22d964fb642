use std::fmt;

use sdp::description::session::SessionDescription;
use serde::{Deserialize, Serialize};

use crate::peer_connection::sdp::ATTR_KEY_CONNECTION_SETUP;

/// RTCDtlsRole indicates the role of the DTLS transport.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCDtlsRole {
    #[default]
    Unspecified = 0,

    /// DTLSRoleAuto defines the DTLS role is determined based on
    /// the resolved ICE role: the ICE controlled role acts as the DTLS
    /// client and the ICE controlling role acts as the DTLS server.
    #[serde(rename = "auto")]
    Auto = 1,

    /// DTLSRoleClient defines the DTLS client role.
    #[serde(rename = "client")]
    Client = 2,

    /// DTLSRoleServer defines the DTLS server role.
    #[serde(rename = "server")]
    Server = 3,
}

/// <https://tools.ietf.org/html/rfc5763>
/// The answerer MUST use either a
/// setup attribute value of setup:active or setup:passive.  Note that
/// if the answerer uses setup:passive, then the DTLS handshake will
/// not begin until the answerer is received, which adds additional
/// latency. setup:active allows the answer and the DTLS handshake to
/// occur in parallel.  Thus, setup:active is RECOMMENDED.
pub(crate) const DEFAULT_DTLS_ROLE_ANSWER: RTCDtlsRole = RTCDtlsRole::Client;

impl fmt::Display for RTCDtlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCDtlsRole::Auto => write!(f, "auto"),
            RTCDtlsRole::Client => write!(f, "client"),
            RTCDtlsRole::Server => write!(f, "server"),
            _ => write!(
                f,
                "{}",
                crate::peer_connection::configuration::UNSPECIFIED_STR
            ),
        }
    }
}

/// Iterate a SessionDescription from a remote to determine if an explicit
/// role can been determined from it. The decision is made from the first role we we parse.
/// If no role can be found we return DTLSRoleAuto
impl From<&SessionDescription> for RTCDtlsRole {
    fn from(session_description: &SessionDescription) -> Self {
        for media_section in &session_description.media_descriptions {
            for attribute in &media_section.attributes {
                if attribute.key == ATTR_KEY_CONNECTION_SETUP {
                    return match attribute.value.as_deref() {
                        Some("active") => RTCDtlsRole::Client,
                        Some("passive") => RTCDtlsRole::Server,
                        _ => RTCDtlsRole::Auto,
                    };
                }
            }
        }

        RTCDtlsRole::Auto
    }
}

impl RTCDtlsRole {
    /// Role the answerer takes given the role the remote offer announced.
    pub(crate) fn answering(remote: RTCDtlsRole) -> RTCDtlsRole {
        match remote {
            RTCDtlsRole::Client => RTCDtlsRole::Server,
            RTCDtlsRole::Server => RTCDtlsRole::Client,
            _ => DEFAULT_DTLS_ROLE_ANSWER,
        }
    }

    /// Value of the `a=setup` attribute announcing this role.
    pub(crate) fn to_connection_role(self) -> &'static str {
        match self {
            RTCDtlsRole::Client => "active",
            RTCDtlsRole::Server => "passive",
            RTCDtlsRole::Auto => "actpass",
            RTCDtlsRole::Unspecified => "",
        }
    }

    pub(crate) fn is_client(self) -> bool {
        self == RTCDtlsRole::Client
    }
}
