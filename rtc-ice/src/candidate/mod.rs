
pub mod candidate_pair;

use crc::{CRC_32_ISCSI, Crc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use shared::error::{Error, Result};

pub(crate) const DEFAULT_LOCAL_PREFERENCE: u16 = 65535;

/// Indicates that the candidate is used for RTP.
pub(crate) const COMPONENT_RTP: u16 = 1;

/// Represents the type of candidate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CandidateType {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "prflx")]
    PeerReflexive,
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            CandidateType::Host => "host",
            CandidateType::PeerReflexive => "prflx",
            CandidateType::Unspecified => "Unknown candidate type",
        };
        write!(f, "{s}")
    }
}

impl CandidateType {
    /// Returns the preference weight of a `CandidateType`.
    ///
    /// 4.1.2.2.  Guidelines for Choosing Type and Local Preferences
    /// The RECOMMENDED values are 126 for host candidates, 100
    /// for server reflexive candidates, 110 for peer reflexive candidates,
    /// and 0 for relayed candidates.
    #[must_use]
    pub const fn preference(self) -> u16 {
        match self {
            Self::Host => 126,
            Self::PeerReflexive => 110,
            Self::Unspecified => 0,
        }
    }
}

/// A host-only ICE candidate: a transport address on one side of a pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub candidate_type: CandidateType,
    pub address: SocketAddr,
    pub component: u16,
}

impl Candidate {
    pub fn new(candidate_type: CandidateType, address: SocketAddr) -> Self {
        Self {
            candidate_type,
            address,
            component: COMPONENT_RTP,
        }
    }

    /// Computes the priority for this ICE Candidate
    /// See: <https://www.rfc-editor.org/rfc/rfc8445#section-5.1.2.1>
    pub fn priority(&self) -> u32 {
        (1 << 24) * u32::from(self.candidate_type.preference())
            + (1 << 8) * u32::from(DEFAULT_LOCAL_PREFERENCE)
            + (256 - u32::from(self.component))
    }
}

impl Candidate {
    /// Foundation of the candidate: the same for candidates of one type on one
    /// address, as required by RFC 8445 §5.1.1.3.
    pub fn foundation(&self) -> String {
        let mut buf = vec![];
        buf.extend_from_slice(self.candidate_type.to_string().as_bytes());
        buf.extend_from_slice(self.address.ip().to_string().as_bytes());
        buf.extend_from_slice(b"udp");

        let checksum = Crc::<u32>::new(&CRC_32_ISCSI).checksum(&buf);
        format!("{checksum}")
    }

    /// Encodes the candidate as the value of an `a=candidate` attribute.
    pub fn marshal(&self) -> String {
        format!(
            "{} {} udp {} {} {} typ {}",
            self.foundation(),
            self.component,
            self.priority(),
            self.address.ip(),
            self.address.port(),
            self.candidate_type
        )
    }
}

/// Parses the value of an `a=candidate` attribute. Only UDP host and peer
/// reflexive candidates of the RTP component are accepted.
pub fn unmarshal_candidate(raw: &str) -> Result<Candidate> {
    let raw = raw.strip_prefix("candidate:").unwrap_or(raw);
    let split: Vec<&str> = raw.split_whitespace().collect();
    if split.len() < 8 {
        return Err(Error::OtherIceErr(format!(
            "attribute not long enough to be ICE candidate ({})",
            split.len()
        )));
    }

    let component: u16 = split[1].parse()?;
    if component != COMPONENT_RTP {
        return Err(Error::OtherIceErr(format!(
            "unsupported candidate component {component}"
        )));
    }
    if !split[2].eq_ignore_ascii_case("udp") {
        return Err(Error::OtherIceErr(format!(
            "unsupported candidate transport {}",
            split[2]
        )));
    }

    let ip: IpAddr = split[4].parse()?;
    let port: u16 = split[5].parse()?;

    let candidate_type = match (split[6], split[7]) {
        ("typ", "host") => CandidateType::Host,
        ("typ", "prflx") => CandidateType::PeerReflexive,
        (_, typ) => {
            return Err(Error::OtherIceErr(format!(
                "unsupported candidate type {typ}"
            )));
        }
    };

    Ok(Candidate::new(candidate_type, SocketAddr::new(ip, port)))
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.candidate_type, self.address)
    }
}
