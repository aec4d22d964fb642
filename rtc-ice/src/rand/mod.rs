
use shared::util::{RUNES_ALPHA, generate_crypto_random_string};

const LEN_UFRAG: usize = 16;
const LEN_PWD: usize = 32;

/// Generates ICE pwd: 32 letters, 182 bits of entropy.
pub fn generate_pwd() -> String {
    generate_crypto_random_string(LEN_PWD, RUNES_ALPHA)
}

/// ICE user fragment: 16 letters.
pub fn generate_ufrag() -> String {
    generate_crypto_random_string(LEN_UFRAG, RUNES_ALPHA)
}
