use shared::error::{Error, Result};

pub const RECORD_LAYER_HEADER_SIZE: usize = 13;
pub const MAX_SEQUENCE_NUMBER: u64 = 0x0000_FFFF_FFFF_FFFF;

pub const PROTOCOL_VERSION1_2: ProtocolVersion = ProtocolVersion {
    major: 0xfe,
    minor: 0xfd,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

/// <https://tools.ietf.org/html/rfc4346#section-6.2.1>
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
    #[default]
    Invalid,
}

impl From<u8> for ContentType {
    fn from(c: u8) -> Self {
        match c {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Invalid,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordLayerHeader {
    pub content_type: ContentType,
    pub content_len: u16,
    pub protocol_version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64, // uint48 on the wire
}

impl RecordLayerHeader {
    pub fn size(&self) -> usize {
        RECORD_LAYER_HEADER_SIZE
    }

    pub fn marshal(&self, writer: &mut Vec<u8>) -> Result<()> {
        if self.sequence_number > MAX_SEQUENCE_NUMBER {
            return Err(Error::OtherDtlsErr(
                "sequence number overflow".to_owned(),
            ));
        }

        writer.push(self.content_type as u8);
        writer.push(self.protocol_version.major);
        writer.push(self.protocol_version.minor);
        writer.extend_from_slice(&self.epoch.to_be_bytes());
        writer.extend_from_slice(&self.sequence_number.to_be_bytes()[2..]);
        writer.extend_from_slice(&self.content_len.to_be_bytes());

        Ok(())
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() < RECORD_LAYER_HEADER_SIZE {
            return Err(Error::ErrBufferShort);
        }

        let content_type = ContentType::from(buf[0]);
        let protocol_version = ProtocolVersion {
            major: buf[1],
            minor: buf[2],
        };
        let epoch = u16::from_be_bytes([buf[3], buf[4]]);

        // SequenceNumber is stored as uint48, make into uint64
        let mut sequence_number = [0u8; 8];
        sequence_number[2..].copy_from_slice(&buf[5..11]);
        let sequence_number = u64::from_be_bytes(sequence_number);

        if protocol_version != PROTOCOL_VERSION1_2 {
            return Err(Error::OtherDtlsErr(format!(
                "unsupported protocol version {}.{}",
                protocol_version.major, protocol_version.minor
            )));
        }
        let content_len = u16::from_be_bytes([buf[11], buf[12]]);

        Ok(RecordLayerHeader {
            content_type,
            content_len,
            protocol_version,
            epoch,
            sequence_number,
        })
    }
}

/// Splits a datagram into its DTLS records. A trailing partial record is dropped.
pub fn unpack_datagram(buf: &[u8]) -> Vec<&[u8]> {
    let mut out = vec![];
    let mut offset = 0;
    while buf.len() - offset >= RECORD_LAYER_HEADER_SIZE {
        let pkt_len = RECORD_LAYER_HEADER_SIZE
            + u16::from_be_bytes([buf[offset + 11], buf[offset + 12]]) as usize;
        if offset + pkt_len > buf.len() {
            break;
        }
        out.push(&buf[offset..offset + pkt_len]);
        offset += pkt_len;
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_layer_header() -> Result<()> {
        let raw = vec![0x17, 0xfe, 0xfd, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2a, 0x00, 0x05];
        let h = RecordLayerHeader::unmarshal(&raw)?;
        assert_eq!(h.content_type, ContentType::ApplicationData);
        assert_eq!(h.epoch, 1);
        assert_eq!(h.sequence_number, 42);
        assert_eq!(h.content_len, 5);

        let mut out = vec![];
        h.marshal(&mut out)?;
        assert_eq!(out, raw);

        Ok(())
    }

    #[test]
    fn test_unpack_datagram() {
        let mut datagram = vec![0x17, 0xfe, 0xfd, 0, 1, 0, 0, 0, 0, 0, 1, 0, 2, 0xaa, 0xbb];
        datagram.extend_from_slice(&[0x17, 0xfe, 0xfd, 0, 1, 0, 0, 0, 0, 0, 2, 0, 1, 0xcc]);
        // truncated third record
        datagram.extend_from_slice(&[0x17, 0xfe, 0xfd, 0, 1]);

        let records = unpack_datagram(&datagram);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].len(), 15);
        assert_eq!(records[1][13], 0xcc);
    }
}
