use crc::{CRC_32_ISO_HDLC, Crc};
use log::trace;

use super::SnapshotAggregate;
use shared::error::{Error, Result};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"RSNP";
pub const SNAPSHOT_VERSION: u16 = 1;
/// magic(4) version(2) flags(2) payload length(8) crc(4)
pub const SNAPSHOT_HEADER_SIZE: usize = 20;

const CHECKSUM: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Encodes `aggregate` into the on-disk envelope:
///
/// ```text
/// | "RSNP" | version u16 | flags u16 | payload length u64 | CRC-32 u32 | bincode payload |
/// ```
///
/// All integers are big endian. The CRC covers the payload only. Encoding is
/// deterministic, so an unchanged aggregate always yields the same bytes.
pub fn marshal(aggregate: &SnapshotAggregate) -> Result<Vec<u8>> {
    let payload =
        bincode::serialize(aggregate).map_err(|e| Error::ErrSnapshotInvalid(e.to_string()))?;

    let mut out = Vec::with_capacity(SNAPSHOT_HEADER_SIZE + payload.len());
    out.extend_from_slice(&SNAPSHOT_MAGIC);
    out.extend_from_slice(&SNAPSHOT_VERSION.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(&CHECKSUM.checksum(&payload).to_be_bytes());
    out.extend_from_slice(&payload);

    trace!(
        "marshaled snapshot aggregate: {} sessions, {} bytes",
        aggregate.len(),
        out.len()
    );
    Ok(out)
}

/// Decodes an envelope produced by [`marshal`] and validates every record.
pub fn unmarshal(buf: &[u8]) -> Result<SnapshotAggregate> {
    if buf.len() < SNAPSHOT_HEADER_SIZE {
        return Err(Error::ErrSnapshotCorrupted(format!(
            "{} bytes is shorter than the header",
            buf.len()
        )));
    }
    if buf[0..4] != SNAPSHOT_MAGIC {
        return Err(Error::ErrSnapshotCorrupted("bad magic".to_owned()));
    }

    let version = u16::from_be_bytes([buf[4], buf[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(Error::ErrSnapshotVersion(version));
    }

    let mut len = [0u8; 8];
    len.copy_from_slice(&buf[8..16]);
    let len = u64::from_be_bytes(len);
    let payload = &buf[SNAPSHOT_HEADER_SIZE..];
    if payload.len() as u64 != len {
        return Err(Error::ErrSnapshotCorrupted(format!(
            "payload is {} bytes, header says {len}",
            payload.len()
        )));
    }

    let expected = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);
    let actual = CHECKSUM.checksum(payload);
    if expected != actual {
        return Err(Error::ErrSnapshotCorrupted(format!(
            "crc {actual:#010x} != {expected:#010x}"
        )));
    }

    let aggregate: SnapshotAggregate =
        bincode::deserialize(payload).map_err(|e| Error::ErrSnapshotCorrupted(e.to_string()))?;
    for session in &aggregate.sessions {
        session.validate()?;
    }

    Ok(aggregate)
}
