use std::sync::Arc;

use log::trace;

use crate::media_stream::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use crate::media_stream::track_local::{TrackLocal, TrackLocalContext};
use crate::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use crate::rtp_transceiver::{PayloadType, SSRC};
use shared::error::Result;

/// RTCRtpEncodingParameters describes one negotiated outbound encoding.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct RTCRtpEncodingParameters {
    pub ssrc: SSRC,
    pub payload_type: PayloadType,
    pub active: bool,
}

/// RTCRtpSendParameters contains the RTP stack settings used by receivers
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpSendParameters {
    pub codec: RTCRtpCodecCapability,
    pub encodings: Vec<RTCRtpEncodingParameters>,
}

/// RTCRtpSender allows an application to control how a given track is encoded and transmitted
/// to a remote peer. Its SSRC is fixed at creation; the encoding only appears in
/// [`get_parameters`](RTCRtpSender::get_parameters) once a remote description has
/// negotiated a media section for it.
#[derive(Debug, Clone)]
pub struct RTCRtpSender {
    track: Arc<TrackLocalStaticRTP>,
    ssrc: SSRC,
    payload_type: PayloadType,
    negotiated: bool,
    stopped: bool,
}

impl RTCRtpSender {
    /// Binds `track` to `ssrc`. Fails when another sender already uses that SSRC on the
    /// same track.
    pub(crate) fn new(track: Arc<TrackLocalStaticRTP>, ssrc: SSRC) -> Result<Self> {
        let payload_type = track.codec().default_payload_type();
        track.bind(TrackLocalContext::new(ssrc, payload_type))?;

        trace!("sender for track {} bound to ssrc {}", track.id(), ssrc);

        Ok(Self {
            track,
            ssrc,
            payload_type,
            negotiated: false,
            stopped: false,
        })
    }

    pub fn track(&self) -> &Arc<TrackLocalStaticRTP> {
        &self.track
    }

    pub fn kind(&self) -> RTPCodecType {
        self.track.kind()
    }

    pub fn ssrc(&self) -> SSRC {
        self.ssrc
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    pub fn is_negotiated(&self) -> bool {
        self.negotiated
    }

    /// get_parameters describes the current configuration for the encoding and
    /// transmission of media on the sender's track.
    pub fn get_parameters(&self) -> RTCRtpSendParameters {
        let encodings = if self.negotiated && !self.stopped {
            vec![RTCRtpEncodingParameters {
                ssrc: self.ssrc,
                payload_type: self.payload_type,
                active: true,
            }]
        } else {
            vec![]
        };

        RTCRtpSendParameters {
            codec: self.track.codec().clone(),
            encodings,
        }
    }

    pub(crate) fn set_negotiated(&mut self) {
        self.negotiated = true;
    }

    /// Releases the track binding. Stopping twice is a no-op.
    pub(crate) fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.track.unbind(self.ssrc)
    }
}
