use super::*;
use bytes::Bytes;
use crate::option::srtp_replay_protection;

const CM_MASTER_KEY: [u8; 16] = [
    0x0d, 0xcd, 0x21, 0x3e, 0x4c, 0xbc, 0xf2, 0x8f, 0x01, 0x7f, 0x69, 0x94, 0x40, 0x1e, 0x28, 0x89,
];
const CM_MASTER_SALT: [u8; 14] = [
    0x62, 0x77, 0x60, 0x38, 0xc0, 0x6d, 0xc9, 0x41, 0x9f, 0x6d, 0xd9, 0x43, 0x3e, 0x7c,
];
const GCM_MASTER_KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];
const GCM_MASTER_SALT: [u8; 12] = [
    0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xab,
];

const SSRC: u32 = 5000;

fn build_rtp(ssrc: u32, sequence_number: u16, payload: &[u8]) -> Vec<u8> {
    let mut raw = vec![0x80, 0x6f];
    raw.extend_from_slice(&sequence_number.to_be_bytes());
    raw.extend_from_slice(&(sequence_number as u32 * 960).to_be_bytes());
    raw.extend_from_slice(&ssrc.to_be_bytes());
    raw.extend_from_slice(payload);
    raw
}

fn build_contexts(profile: ProtectionProfile) -> Result<(Context, Context)> {
    let (key, salt): (&[u8], &[u8]) = match profile {
        ProtectionProfile::AeadAes128Gcm => (&GCM_MASTER_KEY[..], &GCM_MASTER_SALT[..]),
        _ => (&CM_MASTER_KEY[..], &CM_MASTER_SALT[..]),
    };
    let encrypt = Context::new(key, salt, profile, None)?;
    let decrypt = Context::new(key, salt, profile, Some(srtp_replay_protection(64)))?;
    Ok((encrypt, decrypt))
}

#[test]
fn test_context_rejects_bad_key_lengths() {
    let result = Context::new(
        &CM_MASTER_KEY[..15],
        &CM_MASTER_SALT,
        ProtectionProfile::Aes128CmHmacSha1_80,
        None,
    );
    assert!(matches!(result, Err(Error::SrtpMasterKeyLength(16, 15))));

    let result = Context::new(
        &GCM_MASTER_KEY,
        &CM_MASTER_SALT,
        ProtectionProfile::AeadAes128Gcm,
        None,
    );
    assert!(matches!(result, Err(Error::SrtpSaltLength(12, 14))));
}

#[test]
fn test_rtp_lifecycle() -> Result<()> {
    for profile in [
        ProtectionProfile::Aes128CmHmacSha1_80,
        ProtectionProfile::Aes128CmHmacSha1_32,
        ProtectionProfile::AeadAes128Gcm,
    ] {
        let (mut encrypt, mut decrypt) = build_contexts(profile)?;
        let tag_len = profile.rtp_auth_tag_len() + profile.aead_auth_tag_len();

        for sequence_number in 5000u16..5010 {
            let decrypted = build_rtp(SSRC, sequence_number, &[0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);

            let encrypted = encrypt.encrypt_rtp(&decrypted)?;
            assert_eq!(encrypted.len(), decrypted.len() + tag_len, "{profile:?}");
            assert_eq!(&encrypted[..12], &decrypted[..12], "{profile:?}: header in clear");
            assert_ne!(&encrypted[12..18], &decrypted[12..], "{profile:?}: payload in clear");

            let actual = decrypt.decrypt_rtp(&encrypted)?;
            assert_eq!(&actual[..], &decrypted[..], "{profile:?}");
        }
    }

    Ok(())
}

#[test]
fn test_rtp_invalid_auth() -> Result<()> {
    for profile in [
        ProtectionProfile::Aes128CmHmacSha1_80,
        ProtectionProfile::AeadAes128Gcm,
    ] {
        let (mut encrypt, mut decrypt) = build_contexts(profile)?;

        let encrypted = encrypt.encrypt_rtp(&build_rtp(SSRC, 1, &[0xaa; 20]))?;
        let mut tampered = encrypted.to_vec();
        tampered[14] ^= 0x01;

        assert_eq!(
            decrypt.decrypt_rtp(&tampered),
            Err(Error::ErrFailedToVerifyAuthTag),
            "{profile:?}"
        );

        // a failed packet does not poison the window
        assert!(decrypt.decrypt_rtp(&encrypted).is_ok(), "{profile:?}");
    }

    Ok(())
}

#[test]
fn test_rtp_replay_rejected() -> Result<()> {
    let (mut encrypt, mut decrypt) = build_contexts(ProtectionProfile::AeadAes128Gcm)?;

    let first = encrypt.encrypt_rtp(&build_rtp(SSRC, 10, &[1, 2, 3]))?;
    let second = encrypt.encrypt_rtp(&build_rtp(SSRC, 11, &[4, 5, 6]))?;

    decrypt.decrypt_rtp(&first)?;
    decrypt.decrypt_rtp(&second)?;
    assert_eq!(
        decrypt.decrypt_rtp(&first),
        Err(Error::SrtpSsrcDuplicated(SSRC, 10))
    );

    Ok(())
}

#[test]
fn test_rollover_count_across_wrap() -> Result<()> {
    let (mut encrypt, mut decrypt) = build_contexts(ProtectionProfile::Aes128CmHmacSha1_80)?;

    for sequence_number in [65533u16, 65534, 65535, 0, 1] {
        let encrypted = encrypt.encrypt_rtp(&build_rtp(SSRC, sequence_number, &[0x42; 8]))?;
        decrypt.decrypt_rtp(&encrypted)?;
    }

    let encrypt_state = encrypt.get_srtp_state();
    let decrypt_state = decrypt.get_srtp_state();
    assert_eq!(encrypt_state[&SSRC].rollover_counter(), 1);
    assert_eq!(encrypt_state[&SSRC].index, (1 << 16) | 1);
    assert_eq!(decrypt_state[&SSRC].index, (1 << 16) | 1);
    assert!(encrypt_state[&SSRC].replay.is_none());
    assert!(decrypt_state[&SSRC].replay.is_some());

    Ok(())
}

#[test]
fn test_next_rollover_count_late_packet() {
    let mut state = SsrcState::new(SSRC, None);
    state.update_rollover_count(2, 0);
    state.index |= 1 << 16;

    // a packet from before the wrap keeps the previous ROC and does not rewind
    let (roc, diff, ovf) = state.next_rollover_count(65534);
    assert_eq!((roc, diff, ovf), (0, -4, false));
    state.update_rollover_count(65534, diff);
    assert_eq!(state.index, (1 << 16) | 2);

    let (roc, diff, ovf) = state.next_rollover_count(3);
    assert_eq!((roc, diff, ovf), (1, 1, false));
}

#[test]
fn test_exceeded_max_packets() -> Result<()> {
    let (mut encrypt, _) = build_contexts(ProtectionProfile::AeadAes128Gcm)?;
    let mut states = BTreeMap::new();
    states.insert(
        SSRC,
        SrtpSsrcState {
            index: MAX_SRTP_INDEX,
            rollover_has_processed: true,
            replay: None,
        },
    );
    encrypt.set_srtp_state(&states)?;

    assert_eq!(
        encrypt.encrypt_rtp(&build_rtp(SSRC, 0, &[0x01])),
        Err(Error::ErrExceededMaxPackets(SSRC))
    );

    Ok(())
}

#[test]
fn test_srtp_state_resume_continuity() -> Result<()> {
    let (mut encrypt, mut decrypt) = build_contexts(ProtectionProfile::AeadAes128Gcm)?;

    let mut last = Bytes::new();
    for sequence_number in 65530u16..=65535 {
        last = encrypt.encrypt_rtp(&build_rtp(SSRC, sequence_number, &[0x10; 16]))?;
        decrypt.decrypt_rtp(&last)?;
    }

    let encrypt_state = encrypt.get_srtp_state();
    let decrypt_state = decrypt.get_srtp_state();

    // a process restart: same keys, seeded positions
    let (mut resumed_encrypt, mut resumed_decrypt) =
        build_contexts(ProtectionProfile::AeadAes128Gcm)?;
    resumed_encrypt.set_srtp_state(&encrypt_state)?;
    resumed_decrypt.set_srtp_state(&decrypt_state)?;
    assert_eq!(resumed_decrypt.get_srtp_state(), decrypt_state);

    let after_wrap = resumed_encrypt.encrypt_rtp(&build_rtp(SSRC, 0, &[0x20; 16]))?;
    let decrypted = resumed_decrypt.decrypt_rtp(&after_wrap)?;
    assert_eq!(&decrypted[12..], &[0x20; 16]);

    // packets seen before the capture stay rejected
    assert_eq!(
        resumed_decrypt.decrypt_rtp(&last),
        Err(Error::SrtpSsrcDuplicated(SSRC, 65535))
    );

    // an unseeded receiver guesses ROC 0 and cannot authenticate
    let (_, mut fresh_decrypt) = build_contexts(ProtectionProfile::AeadAes128Gcm)?;
    assert_eq!(
        fresh_decrypt.decrypt_rtp(&after_wrap),
        Err(Error::ErrFailedToVerifyAuthTag)
    );

    Ok(())
}

#[test]
fn test_set_srtp_state_rejects_malformed_window() -> Result<()> {
    let (_, mut decrypt) = build_contexts(ProtectionProfile::AeadAes128Gcm)?;
    let mut states = BTreeMap::new();
    states.insert(
        SSRC,
        SrtpSsrcState {
            index: 12,
            rollover_has_processed: true,
            replay: Some(ReplayDetectorState {
                window_size: 64,
                max_seq: MAX_SRTP_INDEX,
                latest_seq: 12,
                mask: vec![],
            }),
        },
    );

    assert!(matches!(
        decrypt.set_srtp_state(&states),
        Err(Error::ErrSrtpStateInvalid(_))
    ));

    Ok(())
}

#[test]
fn test_srtp_ssrc_state_serialization() -> Result<()> {
    let state = SrtpSsrcState {
        index: (3 << 16) | 77,
        rollover_has_processed: true,
        replay: Some(ReplayDetectorState {
            window_size: 64,
            max_seq: MAX_SRTP_INDEX,
            latest_seq: (3 << 16) | 77,
            mask: vec![0b1011],
        }),
    };

    let buf = state.serialize()?;
    assert_eq!(SrtpSsrcState::deserialize(&buf)?, state);
    assert!(SrtpSsrcState::deserialize(&buf[..buf.len() - 3]).is_err());

    Ok(())
}
