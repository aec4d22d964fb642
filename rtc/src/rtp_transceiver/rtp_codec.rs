use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIME_TYPE_OPUS: &str = "audio/opus";
pub const MIME_TYPE_VP8: &str = "video/VP8";

/// RTPCodecType determines the type of a codec
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RTPCodecType {
    #[default]
    Unspecified = 0,

    /// RTPCodecTypeAudio indicates this is an audio codec
    Audio = 1,

    /// RTPCodecTypeVideo indicates this is a video codec
    Video = 2,
}

impl From<&str> for RTPCodecType {
    fn from(raw: &str) -> Self {
        match raw {
            "audio" => RTPCodecType::Audio,
            "video" => RTPCodecType::Video,
            _ => RTPCodecType::Unspecified,
        }
    }
}

impl From<u8> for RTPCodecType {
    fn from(v: u8) -> Self {
        match v {
            1 => RTPCodecType::Audio,
            2 => RTPCodecType::Video,
            _ => RTPCodecType::Unspecified,
        }
    }
}

impl fmt::Display for RTPCodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTPCodecType::Audio => "audio",
            RTPCodecType::Video => "video",
            RTPCodecType::Unspecified => crate::peer_connection::configuration::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// RTCRtpCodecCapability provides information about codec capabilities.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpCodecCapability {
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub sdp_fmtp_line: String,
}

impl RTCRtpCodecCapability {
    pub fn opus() -> Self {
        Self {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
        }
    }

    pub fn vp8() -> Self {
        Self {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            channels: 0,
            sdp_fmtp_line: String::new(),
        }
    }

    /// Media kind taken from the MIME type prefix.
    pub fn kind(&self) -> RTPCodecType {
        let prefix = self.mime_type.split('/').next().unwrap_or_default();
        RTPCodecType::from(prefix.to_ascii_lowercase().as_str())
    }

    /// Encoding name as it appears in an `a=rtpmap` line.
    pub fn encoding_name(&self) -> &str {
        self.mime_type.split('/').nth(1).unwrap_or_default()
    }

    /// Payload type used in answers for the codecs this crate negotiates.
    pub fn default_payload_type(&self) -> u8 {
        if self.mime_type.eq_ignore_ascii_case(MIME_TYPE_OPUS) {
            111
        } else if self.mime_type.eq_ignore_ascii_case(MIME_TYPE_VP8) {
            96
        } else {
            0
        }
    }
}
