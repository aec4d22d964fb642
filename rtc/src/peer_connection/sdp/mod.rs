pub mod sdp_type;
pub mod session_description;

use std::net::SocketAddr;

use log::debug;
use sdp::description::media::MediaDescription;
use sdp::description::session::SessionDescription;

use ::ice::candidate::{Candidate, unmarshal_candidate};

use crate::media_stream::track_local::TrackLocal;
use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use crate::peer_connection::transport::dtls::role::RTCDtlsRole;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use crate::rtp_transceiver::rtp_sender::RTCRtpSender;
use crate::rtp_transceiver::SSRC;
use shared::error::{Error, Result};

pub(crate) const ATTR_KEY_CANDIDATE: &str = "candidate";
pub(crate) const ATTR_KEY_END_OF_CANDIDATES: &str = "end-of-candidates";
pub(crate) const ATTR_KEY_CONNECTION_SETUP: &str = "setup";
pub(crate) const ATTR_KEY_FINGERPRINT: &str = "fingerprint";
pub(crate) const ATTR_KEY_GROUP: &str = "group";
pub(crate) const ATTR_KEY_ICE_UFRAG: &str = "ice-ufrag";
pub(crate) const ATTR_KEY_ICE_PWD: &str = "ice-pwd";
pub(crate) const ATTR_KEY_ICELITE: &str = "ice-lite";
pub(crate) const ATTR_KEY_MID: &str = "mid";
pub(crate) const ATTR_KEY_RTCPMUX: &str = "rtcp-mux";
pub(crate) const ATTR_KEY_SSRC: &str = "ssrc";

const SDP_ATTRIBUTE_RID: &str = "rid";

/// What one remote m= section negotiates.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaSection {
    pub(crate) kind: RTPCodecType,
    pub(crate) mid: String,
    pub(crate) direction: RTCRtpTransceiverDirection,
    pub(crate) ssrcs: Vec<SSRC>,
}

fn get_mid_value(media: &MediaDescription) -> Option<&str> {
    media
        .attributes
        .iter()
        .find(|a| a.key == ATTR_KEY_MID)
        .and_then(|a| a.value.as_deref())
}

fn get_peer_direction(media: &MediaDescription) -> RTCRtpTransceiverDirection {
    for a in &media.attributes {
        let direction = RTCRtpTransceiverDirection::from(a.key.as_str());
        if direction != RTCRtpTransceiverDirection::Unspecified {
            return direction;
        }
    }
    RTCRtpTransceiverDirection::Unspecified
}

fn get_ssrcs(media: &MediaDescription) -> Vec<SSRC> {
    let mut ssrcs = vec![];
    for a in &media.attributes {
        if a.key != ATTR_KEY_SSRC {
            continue;
        }
        let Some(value) = &a.value else { continue };
        let Some(Ok(ssrc)) = value.split_whitespace().next().map(|s| s.parse::<SSRC>()) else {
            continue;
        };
        if !ssrcs.contains(&ssrc) {
            ssrcs.push(ssrc);
        }
    }
    ssrcs
}

/// Audio and video sections of a remote description, in order. Other media
/// kinds are skipped. A section without `a=mid` gets its index as mid, and a
/// section without a direction attribute is sendrecv.
pub(crate) fn media_sections(desc: &SessionDescription) -> Vec<MediaSection> {
    let mut sections = vec![];
    for (i, media) in desc.media_descriptions.iter().enumerate() {
        let kind = RTPCodecType::from(media.media_name.media.as_str());
        if kind == RTPCodecType::Unspecified {
            debug!("skipping media section of kind {}", media.media_name.media);
            continue;
        }
        if media.attributes.iter().any(|a| a.key == SDP_ATTRIBUTE_RID) {
            debug!("simulcast media section {i} is negotiated on its first layer only");
        }

        let direction = match get_peer_direction(media) {
            RTCRtpTransceiverDirection::Unspecified => RTCRtpTransceiverDirection::Sendrecv,
            d => d,
        };

        sections.push(MediaSection {
            kind,
            mid: get_mid_value(media)
                .map(|s| s.to_owned())
                .unwrap_or_else(|| i.to_string()),
            direction,
            ssrcs: get_ssrcs(media),
        });
    }
    sections
}

fn find_attribute<'a>(desc: &'a SessionDescription, key: &str) -> Option<&'a str> {
    if let Some(a) = desc.attributes.iter().find(|a| a.key == key) {
        return a.value.as_deref();
    }
    desc.media_descriptions
        .iter()
        .flat_map(|m| m.attributes.iter())
        .find(|a| a.key == key)
        .and_then(|a| a.value.as_deref())
}

/// ICE credentials and UDP candidates announced by the remote side. Session
/// level credentials win over media level ones. Candidates this agent can not
/// use are skipped.
pub(crate) fn extract_ice_details(
    desc: &SessionDescription,
) -> Result<(String, String, Vec<Candidate>)> {
    let remote_ufrag = find_attribute(desc, ATTR_KEY_ICE_UFRAG)
        .filter(|s| !s.is_empty())
        .ok_or(Error::ErrSessionDescriptionMissingIceUfrag)?
        .to_owned();
    let remote_pwd = find_attribute(desc, ATTR_KEY_ICE_PWD)
        .filter(|s| !s.is_empty())
        .ok_or(Error::ErrSessionDescriptionMissingIcePwd)?
        .to_owned();

    let mut candidates = vec![];
    for media in &desc.media_descriptions {
        for a in &media.attributes {
            if a.key != ATTR_KEY_CANDIDATE {
                continue;
            }
            let Some(value) = &a.value else { continue };
            match unmarshal_candidate(value) {
                Ok(c) => {
                    if !candidates.contains(&c) {
                        candidates.push(c);
                    }
                }
                Err(err) => debug!("skipping remote candidate {value}: {err}"),
            }
        }
    }

    Ok((remote_ufrag, remote_pwd, candidates))
}

/// Remote certificate fingerprint, from the session level or the first media
/// section carrying one.
pub(crate) fn extract_fingerprint(desc: &SessionDescription) -> Result<RTCDtlsFingerprint> {
    let value = find_attribute(desc, ATTR_KEY_FINGERPRINT)
        .ok_or(Error::ErrSessionDescriptionNoFingerprint)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(algorithm), Some(value)) => Ok(RTCDtlsFingerprint {
            algorithm: algorithm.to_owned(),
            value: value.to_owned(),
        }),
        _ => Err(Error::ErrSessionDescriptionNoFingerprint),
    }
}

/// Reports whether the remote side only wants to receive media, which makes
/// this session a viewer.
pub(crate) fn is_receive_only(desc: &SessionDescription) -> bool {
    media_sections(desc)
        .iter()
        .any(|m| m.direction == RTCRtpTransceiverDirection::Recvonly)
}

/// One m= section of an answer.
pub(crate) struct MediaSectionAnswer<'a> {
    pub(crate) kind: RTPCodecType,
    pub(crate) mid: &'a str,
    pub(crate) direction: RTCRtpTransceiverDirection,
    pub(crate) sender: Option<&'a RTCRtpSender>,
}

/// Parameters shared by every section of an answer.
pub(crate) struct AnswerParams<'a> {
    pub(crate) ice_ufrag: &'a str,
    pub(crate) ice_pwd: &'a str,
    pub(crate) ice_lite: bool,
    pub(crate) candidate: &'a Candidate,
    pub(crate) fingerprints: &'a [RTCDtlsFingerprint],
    pub(crate) dtls_role: RTCDtlsRole,
}

fn codec_for_kind(kind: RTPCodecType, sender: Option<&RTCRtpSender>) -> RTCRtpCodecCapability {
    match sender {
        Some(sender) => sender.track().codec().clone(),
        None if kind == RTPCodecType::Audio => RTCRtpCodecCapability::opus(),
        None => RTCRtpCodecCapability::vp8(),
    }
}

fn add_transceiver_sdp(
    media: &MediaSectionAnswer<'_>,
    params: &AnswerParams<'_>,
    is_first: bool,
) -> MediaDescription {
    let codec = codec_for_kind(media.kind, media.sender);
    let payload_type = match media.sender {
        Some(sender) => sender.payload_type(),
        None => codec.default_payload_type(),
    };

    let mut m = MediaDescription::new_jsep_media_description(media.kind.to_string(), vec![])
        .with_value_attribute(
            ATTR_KEY_CONNECTION_SETUP.to_owned(),
            params.dtls_role.to_connection_role().to_owned(),
        )
        .with_value_attribute(ATTR_KEY_MID.to_owned(), media.mid.to_owned())
        .with_ice_credentials(params.ice_ufrag.to_owned(), params.ice_pwd.to_owned())
        .with_property_attribute(ATTR_KEY_RTCPMUX.to_owned())
        .with_codec(
            payload_type,
            codec.encoding_name().to_owned(),
            codec.clock_rate,
            codec.channels,
            codec.sdp_fmtp_line.clone(),
        );

    if let Some(sender) = media.sender
        && media.direction.has_send()
    {
        let track = sender.track();
        m = m.with_media_source(
            sender.ssrc(),
            track.stream_id().to_owned(), /* cname */
            track.stream_id().to_owned(), /* streamLabel */
            track.id().to_owned(),
        );
    }

    m = m.with_property_attribute(media.direction.to_string());

    if is_first {
        m = m
            .with_candidate(params.candidate.marshal())
            .with_property_attribute(ATTR_KEY_END_OF_CANDIDATES.to_owned());
    }

    m
}

/// Builds the answer: one bundled section per remote section, with the local
/// credentials, fingerprint and host candidate.
pub(crate) fn populate_sdp(
    media_sections: &[MediaSectionAnswer<'_>],
    params: &AnswerParams<'_>,
) -> SessionDescription {
    let mut d = SessionDescription::new_jsep_session_description(false);

    let mids: Vec<&str> = media_sections.iter().map(|m| m.mid).collect();
    if !mids.is_empty() {
        d = d.with_value_attribute(ATTR_KEY_GROUP.to_owned(), format!("BUNDLE {}", mids.join(" ")));
    }
    for fingerprint in params.fingerprints {
        d = d.with_value_attribute(
            ATTR_KEY_FINGERPRINT.to_owned(),
            format!("{} {}", fingerprint.algorithm, fingerprint.value.to_uppercase()),
        );
    }
    if params.ice_lite {
        d = d.with_property_attribute(ATTR_KEY_ICELITE.to_owned());
    }

    for (i, media) in media_sections.iter().enumerate() {
        d = d.with_media(add_transceiver_sdp(media, params, i == 0));
    }

    d
}
