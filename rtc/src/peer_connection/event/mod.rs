use crate::peer_connection::state::{RTCIceConnectionState, RTCPeerConnectionState};
use crate::rtp_transceiver::SSRC;
use crate::rtp_transceiver::rtp_codec::RTPCodecType;

/// Announces an inbound media flow negotiated by the remote description.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCTrackEvent {
    pub kind: RTPCodecType,
    pub ssrc: SSRC,
    pub mid: String,
}

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RTCPeerConnectionEvent {
    OnIceConnectionStateChangeEvent(RTCIceConnectionState),
    OnConnectionStateChangeEvent(RTCPeerConnectionState),

    // The RTP media API extends the RTCPeerConnection interface as described below.
    OnTrack(RTCTrackEvent),
}
