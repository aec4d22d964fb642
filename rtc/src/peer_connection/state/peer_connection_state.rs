use std::fmt;

use crate::peer_connection::configuration::UNSPECIFIED_STR;
use crate::peer_connection::state::RTCIceConnectionState;
use crate::peer_connection::transport::dtls::state::RTCDtlsTransportState;

/// PeerConnectionState indicates the state of the PeerConnection.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCPeerConnectionState {
    #[default]
    Unspecified,

    /// PeerConnectionStateNew indicates that any of the ICETransports or
    /// DTLSTransports are in the "new" state and none of the transports are
    /// in the "connecting", "checking", "failed" or "disconnected" state, or
    /// all transports are in the "closed" state, or there are no transports.
    New,

    /// PeerConnectionStateConnecting indicates that any of the
    /// ICETransports or DTLSTransports are in the "connecting" or
    /// "checking" state and none of them is in the "failed" state.
    Connecting,

    /// PeerConnectionStateConnected indicates that all ICETransports and
    /// DTLSTransports are in the "connected", "completed" or "closed" state
    /// and at least one of them is in the "connected" or "completed" state.
    Connected,

    /// PeerConnectionStateDisconnected indicates that any of the
    /// ICETransports or DTLSTransports are in the "disconnected" state
    /// and none of them are in the "failed" or "connecting" or "checking" state.
    Disconnected,

    /// PeerConnectionStateFailed indicates that any of the ICETransports
    /// or DTLSTransports are in a "failed" state.
    Failed,

    /// PeerConnectionStateClosed indicates the peer connection is closed
    /// and the isClosed member variable of PeerConnection is true.
    Closed,
}

const PEER_CONNECTION_STATE_NEW_STR: &str = "new";
const PEER_CONNECTION_STATE_CONNECTING_STR: &str = "connecting";
const PEER_CONNECTION_STATE_CONNECTED_STR: &str = "connected";
const PEER_CONNECTION_STATE_DISCONNECTED_STR: &str = "disconnected";
const PEER_CONNECTION_STATE_FAILED_STR: &str = "failed";
const PEER_CONNECTION_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCPeerConnectionState {
    fn from(raw: &str) -> Self {
        match raw {
            PEER_CONNECTION_STATE_NEW_STR => RTCPeerConnectionState::New,
            PEER_CONNECTION_STATE_CONNECTING_STR => RTCPeerConnectionState::Connecting,
            PEER_CONNECTION_STATE_CONNECTED_STR => RTCPeerConnectionState::Connected,
            PEER_CONNECTION_STATE_DISCONNECTED_STR => RTCPeerConnectionState::Disconnected,
            PEER_CONNECTION_STATE_FAILED_STR => RTCPeerConnectionState::Failed,
            PEER_CONNECTION_STATE_CLOSED_STR => RTCPeerConnectionState::Closed,
            _ => RTCPeerConnectionState::Unspecified,
        }
    }
}

impl From<u8> for RTCPeerConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCPeerConnectionState::New,
            2 => RTCPeerConnectionState::Connecting,
            3 => RTCPeerConnectionState::Connected,
            4 => RTCPeerConnectionState::Disconnected,
            5 => RTCPeerConnectionState::Failed,
            6 => RTCPeerConnectionState::Closed,
            _ => RTCPeerConnectionState::Unspecified,
        }
    }
}

impl fmt::Display for RTCPeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCPeerConnectionState::New => PEER_CONNECTION_STATE_NEW_STR,
            RTCPeerConnectionState::Connecting => PEER_CONNECTION_STATE_CONNECTING_STR,
            RTCPeerConnectionState::Connected => PEER_CONNECTION_STATE_CONNECTED_STR,
            RTCPeerConnectionState::Disconnected => PEER_CONNECTION_STATE_DISCONNECTED_STR,
            RTCPeerConnectionState::Failed => PEER_CONNECTION_STATE_FAILED_STR,
            RTCPeerConnectionState::Closed => PEER_CONNECTION_STATE_CLOSED_STR,
            RTCPeerConnectionState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCPeerConnectionState {
    /// Failed and Closed are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
        )
    }

    /// Aggregates the transport states as
    /// <https://www.w3.org/TR/webrtc/#rtcpeerconnectionstate-enum> describes.
    /// A DTLS transport the remote closed with close_notify closes the
    /// connection too; it can not carry media again.
    pub(crate) fn aggregate(
        is_closed: bool,
        ice_connection_state: RTCIceConnectionState,
        dtls_transport_state: RTCDtlsTransportState,
    ) -> RTCPeerConnectionState {
        if is_closed
            || ice_connection_state == RTCIceConnectionState::Closed
            || dtls_transport_state == RTCDtlsTransportState::Closed
        {
            RTCPeerConnectionState::Closed
        } else if ice_connection_state == RTCIceConnectionState::Failed
            || dtls_transport_state == RTCDtlsTransportState::Failed
        {
            RTCPeerConnectionState::Failed
        } else if ice_connection_state == RTCIceConnectionState::Disconnected {
            RTCPeerConnectionState::Disconnected
        } else if ice_connection_state == RTCIceConnectionState::New
            && dtls_transport_state == RTCDtlsTransportState::New
        {
            RTCPeerConnectionState::New
        } else if ice_connection_state == RTCIceConnectionState::New
            || ice_connection_state == RTCIceConnectionState::Checking
            || dtls_transport_state == RTCDtlsTransportState::New
            || dtls_transport_state == RTCDtlsTransportState::Connecting
        {
            RTCPeerConnectionState::Connecting
        } else if (ice_connection_state == RTCIceConnectionState::Connected
            || ice_connection_state == RTCIceConnectionState::Completed)
            && dtls_transport_state == RTCDtlsTransportState::Connected
        {
            RTCPeerConnectionState::Connected
        } else {
            RTCPeerConnectionState::New
        }
    }
}
