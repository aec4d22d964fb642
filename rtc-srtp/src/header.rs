use shared::error::{Error, Result};

pub const HEADER_LENGTH: usize = 12;
pub const VERSION_SHIFT: u8 = 6;
pub const VERSION_MASK: u8 = 0x3;
pub const EXTENSION_SHIFT: u8 = 4;
pub const EXTENSION_MASK: u8 = 0x1;
pub const CC_MASK: u8 = 0xF;
pub const SEQ_NUM_OFFSET: usize = 2;
pub const SSRC_OFFSET: usize = 8;
pub const CSRC_LENGTH: usize = 4;
pub const EXTENSION_HEADER_LENGTH: usize = 4;

/// Header is the part of an RTP header SRTP needs: the fields that
/// select keystream and replay state, and where the payload starts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sequence_number: u16,
    pub ssrc: u32,
    /// Length of the fixed header, CSRC list and extension.
    pub header_len: usize,
}

impl Header {
    /// Parses the RTP header at the start of `raw_packet`.
    pub fn unmarshal(raw_packet: &[u8]) -> Result<Self> {
        if raw_packet.len() < HEADER_LENGTH {
            return Err(Error::ErrTooShortRtp(raw_packet.len(), HEADER_LENGTH));
        }

        /*
         *  0                   1                   2                   3
         *  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
         * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
         * |V=2|P|X|  CC   |M|     PT      |       sequence number         |
         * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
         * |                           timestamp                           |
         * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
         * |           synchronization source (SSRC) identifier            |
         * +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
         * |            contributing source (CSRC) identifiers             |
         * |                             ....                              |
         * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
         */
        let b0 = raw_packet[0];
        if (b0 >> VERSION_SHIFT) & VERSION_MASK != 2 {
            return Err(Error::OtherSrtpErr(format!(
                "unsupported rtp version {}",
                (b0 >> VERSION_SHIFT) & VERSION_MASK
            )));
        }
        let extension = (b0 >> EXTENSION_SHIFT) & EXTENSION_MASK > 0;
        let cc = (b0 & CC_MASK) as usize;

        let mut header_len = HEADER_LENGTH + cc * CSRC_LENGTH;
        if raw_packet.len() < header_len {
            return Err(Error::ErrTooShortRtp(raw_packet.len(), header_len));
        }

        if extension {
            if raw_packet.len() < header_len + EXTENSION_HEADER_LENGTH {
                return Err(Error::ErrTooShortRtp(
                    raw_packet.len(),
                    header_len + EXTENSION_HEADER_LENGTH,
                ));
            }
            let extension_words =
                u16::from_be_bytes([raw_packet[header_len + 2], raw_packet[header_len + 3]]);
            header_len += EXTENSION_HEADER_LENGTH + extension_words as usize * 4;
            if raw_packet.len() < header_len {
                return Err(Error::ErrTooShortRtp(raw_packet.len(), header_len));
            }
        }

        let sequence_number =
            u16::from_be_bytes([raw_packet[SEQ_NUM_OFFSET], raw_packet[SEQ_NUM_OFFSET + 1]]);
        let ssrc = u32::from_be_bytes([
            raw_packet[SSRC_OFFSET],
            raw_packet[SSRC_OFFSET + 1],
            raw_packet[SSRC_OFFSET + 2],
            raw_packet[SSRC_OFFSET + 3],
        ]);

        Ok(Header {
            sequence_number,
            ssrc,
            header_len,
        })
    }
}

/// Overwrites the SSRC of a marshaled RTP packet in place.
pub fn rewrite_ssrc(raw_packet: &mut [u8], ssrc: u32) -> Result<()> {
    if raw_packet.len() < HEADER_LENGTH {
        return Err(Error::ErrTooShortRtp(raw_packet.len(), HEADER_LENGTH));
    }
    raw_packet[SSRC_OFFSET..SSRC_OFFSET + 4].copy_from_slice(&ssrc.to_be_bytes());
    Ok(())
}
