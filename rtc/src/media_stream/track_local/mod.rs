pub mod track_local_static_rtp;

use crate::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use shared::error::Result;

/// TrackLocalContext is the binding of a local track to one outbound flow.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TrackLocalContext {
    pub(crate) ssrc: u32,
    pub(crate) payload_type: u8,
}

impl TrackLocalContext {
    pub fn new(ssrc: u32, payload_type: u8) -> Self {
        Self { ssrc, payload_type }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }
}

/// TrackLocal is an interface that controls how the user can send media.
/// One track may be bound to senders of many peer connections.
pub trait TrackLocal {
    /// bind is called when a sender starts using this track. It fails when
    /// the SSRC is already bound.
    fn bind(&self, ctx: TrackLocalContext) -> Result<()>;

    /// unbind should implement the teardown logic when the track is no longer needed.
    fn unbind(&self, ssrc: u32) -> Result<()>;

    /// id is the unique identifier for this Track.
    fn id(&self) -> &str;

    /// stream_id is the group this track belongs too.
    fn stream_id(&self) -> &str;

    /// kind controls if this TrackLocal is audio or video
    fn kind(&self) -> RTPCodecType;

    fn codec(&self) -> &RTCRtpCodecCapability;
}
