pub mod direction;
pub mod rtp_codec;
pub mod rtp_sender;

use std::fmt;

use direction::RTCRtpTransceiverDirection;
use rtp_codec::RTPCodecType;
use rtp_sender::RTCRtpSender;
use shared::error::Result;

/// SSRC represents a synchronization source
/// A synchronization source is a randomly chosen
/// value meant to be globally unique within a particular
/// RTP session. Used to identify a single stream of media.
/// <https://tools.ietf.org/html/rfc3550#section-3>
#[allow(clippy::upper_case_acronyms)]
pub type SSRC = u32;

/// PayloadType identifies the format of the RTP payload and determines
/// its interpretation by the application. Each codec in a RTP Session
/// will have a different payload_type
/// <https://tools.ietf.org/html/rfc3550#section-3>
pub type PayloadType = u8;

/// RTPTransceiverInit dictionary is used when calling the WebRTC function addTransceiver() to provide configuration options for the new transceiver.
#[derive(Default, Debug, Copy, Clone)]
pub struct RTCRtpTransceiverInit {
    pub direction: RTCRtpTransceiverDirection,
    /// Fixed SSRC for the sender instead of a random one. Reconstructed sessions use it
    /// to keep the SSRCs the remote peer already knows.
    pub ssrc_override: Option<SSRC>,
}

/// RTPTransceiver represents a combination of an RTPSender and the inbound flows that
/// share a common mid.
#[derive(Clone)]
pub struct RTCRtpTransceiver {
    mid: Option<String>,
    kind: RTPCodecType,
    sender: Option<RTCRtpSender>,
    remote_ssrcs: Vec<SSRC>,
    direction: RTCRtpTransceiverDirection,
    current_direction: RTCRtpTransceiverDirection,
    stopped: bool,
}

impl fmt::Debug for RTCRtpTransceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RTCRtpTransceiver")
            .field("mid", &self.mid)
            .field("kind", &self.kind)
            .field("sender", &self.sender.as_ref().map(|s| s.ssrc()))
            .field("remote_ssrcs", &self.remote_ssrcs)
            .field("direction", &self.direction)
            .field("current_direction", &self.current_direction)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl RTCRtpTransceiver {
    pub(crate) fn new(
        kind: RTPCodecType,
        sender: Option<RTCRtpSender>,
        direction: RTCRtpTransceiverDirection,
    ) -> Self {
        Self {
            mid: None,
            kind,
            sender,
            remote_ssrcs: vec![],
            direction,
            current_direction: RTCRtpTransceiverDirection::Unspecified,
            stopped: false,
        }
    }

    /// mid gets the Transceiver's mid value. When not already set, this value will be set in CreateOffer or CreateAnswer.
    pub fn mid(&self) -> Option<&str> {
        self.mid.as_deref()
    }

    pub(crate) fn set_mid(&mut self, mid: String) {
        self.mid = Some(mid);
    }

    /// kind returns RTPTransceiver's kind.
    pub fn kind(&self) -> RTPCodecType {
        self.kind
    }

    /// sender returns the RTPTransceiver's RTPSender if it has one
    pub fn sender(&self) -> Option<&RTCRtpSender> {
        self.sender.as_ref()
    }

    pub(crate) fn sender_mut(&mut self) -> Option<&mut RTCRtpSender> {
        self.sender.as_mut()
    }

    /// SSRCs the remote side declared for this media section.
    pub fn remote_ssrcs(&self) -> &[SSRC] {
        &self.remote_ssrcs
    }

    pub(crate) fn set_remote_ssrcs(&mut self, ssrcs: Vec<SSRC>) {
        self.remote_ssrcs = ssrcs;
    }

    /// direction returns the RTPTransceiver's desired direction.
    pub fn direction(&self) -> RTCRtpTransceiverDirection {
        self.direction
    }

    /// current_direction returns the RTPTransceiver's negotiated direction.
    pub fn current_direction(&self) -> RTCRtpTransceiverDirection {
        self.current_direction
    }

    pub(crate) fn set_current_direction(&mut self, d: RTCRtpTransceiverDirection) {
        self.current_direction = d;
    }

    /// Unmatched transceivers are the ones no remote media section has claimed yet.
    pub(crate) fn is_unmatched(&self) -> bool {
        self.mid.is_none() && !self.stopped
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// stop irreversibly stops the RTPTransceiver
    pub(crate) fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.direction = RTCRtpTransceiverDirection::Inactive;
        if let Some(sender) = &mut self.sender {
            sender.stop()?;
        }
        Ok(())
    }
}
