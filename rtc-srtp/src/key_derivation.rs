use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};

use shared::error::{Error, Result};

pub const LABEL_SRTP_ENCRYPTION: u8 = 0x00;
pub const LABEL_SRTP_AUTHENTICATION_TAG: u8 = 0x01;
pub const LABEL_SRTP_SALT: u8 = 0x02;

/// aes_cm_key_derivation is the AES-CM PRF of RFC 3711 Section 4.3.3 with
/// a key derivation rate of zero, so the index over kdr is always zero.
pub(crate) fn aes_cm_key_derivation(
    label: u8,
    master_key: &[u8],
    master_salt: &[u8],
    out_len: usize,
) -> Result<Vec<u8>> {
    let n_master_key = master_key.len();
    if master_salt.len() > n_master_key {
        return Err(Error::SrtpSaltLength(n_master_key, master_salt.len()));
    }

    // x = key_id XOR (master_salt), padded to the block size.
    let mut prf_in = vec![0u8; n_master_key];
    prf_in[..master_salt.len()].copy_from_slice(master_salt);
    prf_in[7] ^= label;

    let block = Aes128::new_from_slice(master_key).map_err(|_| Error::ErrInvalidKeyLength)?;

    let mut out = vec![0u8; out_len.div_ceil(n_master_key) * n_master_key];
    for (n, chunk) in out.chunks_mut(n_master_key).enumerate() {
        prf_in[n_master_key - 2] = (n >> 8) as u8;
        prf_in[n_master_key - 1] = n as u8;

        chunk.copy_from_slice(&prf_in);
        block.encrypt_block(GenericArray::from_mut_slice(chunk));
    }

    out.truncate(out_len);
    Ok(out)
}

/// generate_counter generates the IV for AES counter mode, per RFC 3711
/// Section 4.1.1:
///
/// IV = (k_s * 2^16) XOR (SSRC * 2^64) XOR (i * 2^16)
pub(crate) fn generate_counter(
    sequence_number: u16,
    rollover_counter: u32,
    ssrc: u32,
    session_salt: &[u8],
) -> [u8; 16] {
    let mut counter = [0u8; 16];

    counter[4..8].copy_from_slice(&ssrc.to_be_bytes());
    counter[8..12].copy_from_slice(&rollover_counter.to_be_bytes());
    counter[12..16].copy_from_slice(&((sequence_number as u32) << 16).to_be_bytes());

    for (c, s) in counter.iter_mut().zip(session_salt) {
        *c ^= *s;
    }

    counter
}
