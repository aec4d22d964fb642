use hmac::{Hmac, Mac};
use sha2::Sha256;

use shared::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const PRF_KEY_EXPANSION_LABEL: &str = "key expansion";

fn hmac_sha256(secret: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| Error::OtherDtlsErr(format!("hmac: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// prf_p_hash is the TLS 1.2 P_SHA256 data expansion function.
///
/// <https://tools.ietf.org/html/rfc5246#section-5>
///
/// P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) +
///                        HMAC_hash(secret, A(2) + seed) +
///                        HMAC_hash(secret, A(3) + seed) + ...
///
/// A() is defined as:
///
/// A(0) = seed
/// A(i) = HMAC_hash(secret, A(i-1))
pub fn prf_p_hash(secret: &[u8], seed: &[u8], requested_length: usize) -> Result<Vec<u8>> {
    let mut last_round = seed.to_vec();
    let mut out = Vec::with_capacity(requested_length + 32);

    while out.len() < requested_length {
        last_round = hmac_sha256(secret, &[&last_round])?;
        let with_secret = hmac_sha256(secret, &[&last_round, seed])?;
        out.extend_from_slice(&with_secret);
    }

    out.truncate(requested_length);
    Ok(out)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EncryptionKeys {
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

/// prf_encryption_keys expands the master secret into the record protection keys.
/// AEAD suites carry no MAC key.
pub fn prf_encryption_keys(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    key_len: usize,
    iv_len: usize,
) -> Result<EncryptionKeys> {
    let mut seed = PRF_KEY_EXPANSION_LABEL.as_bytes().to_vec();
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let material = prf_p_hash(master_secret, &seed, (2 * key_len) + (2 * iv_len))?;
    let (client_write_key, rest) = material.split_at(key_len);
    let (server_write_key, rest) = rest.split_at(key_len);
    let (client_write_iv, server_write_iv) = rest.split_at(iv_len);

    Ok(EncryptionKeys {
        client_write_key: client_write_key.to_vec(),
        server_write_key: server_write_key.to_vec(),
        client_write_iv: client_write_iv.to_vec(),
        server_write_iv: server_write_iv.to_vec(),
    })
}
