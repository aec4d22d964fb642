use super::codec::*;
use super::*;

fn broadcaster() -> SessionSnapshot {
    SessionSnapshot {
        remote_description: "v=0\r\n".to_owned(),
        credentials: TransportCredentials {
            port: 50000,
            ufrag: "abc".to_owned(),
            pwd: "xyz".to_owned(),
        },
        dtls_state: vec![1, 2, 3],
        srtp_state: BTreeMap::new(),
        binding: MediaBinding::default(),
    }
}

fn viewer() -> SessionSnapshot {
    let mut srtp_state = BTreeMap::new();
    srtp_state.insert(111, vec![0; 4]);
    srtp_state.insert(222, vec![1; 4]);
    SessionSnapshot {
        srtp_state,
        binding: MediaBinding {
            audio_ssrc: 111,
            video_ssrc: 222,
            role: MediaRole::Viewer,
        },
        ..broadcaster()
    }
}

#[test]
fn test_outbound_ssrcs() {
    assert!(MediaBinding::default().outbound_ssrcs().is_empty());
    assert_eq!(viewer().binding.outbound_ssrcs(), vec![222, 111]);

    let audio_only = MediaBinding {
        audio_ssrc: 111,
        ..Default::default()
    };
    assert_eq!(audio_only.outbound_ssrcs(), vec![111]);
}

#[test]
fn test_validate() {
    assert!(broadcaster().validate().is_ok());
    assert!(viewer().validate().is_ok());

    let mut no_port = broadcaster();
    no_port.credentials.port = 0;

    let mut no_pwd = broadcaster();
    no_pwd.credentials.pwd.clear();

    let mut no_dtls = broadcaster();
    no_dtls.dtls_state.clear();

    let mut shared_ssrc = viewer();
    shared_ssrc.binding.video_ssrc = 111;

    let mut sending_broadcaster = viewer();
    sending_broadcaster.binding.role = MediaRole::Broadcaster;

    let mut missing_key = viewer();
    missing_key.srtp_state.remove(&222);

    let tests = vec![
        ("port", no_port),
        ("pwd", no_pwd),
        ("dtls", no_dtls),
        ("shared ssrc", shared_ssrc),
        ("sending broadcaster", sending_broadcaster),
        ("missing key", missing_key),
    ];
    for (name, snapshot) in tests {
        let err = snapshot.validate().unwrap_err();
        assert!(err.is_integrity_violation(), "{name}: {err}");
    }
}

#[test]
fn test_round_trip_keeps_empty_maps_and_zero_ssrcs() -> Result<()> {
    let tests = vec![
        SnapshotAggregate::default(),
        SnapshotAggregate::new(vec![broadcaster()]),
        SnapshotAggregate::new(vec![broadcaster(), viewer()]),
    ];

    for aggregate in tests {
        let raw = marshal(&aggregate)?;
        assert_eq!(&raw[..4], b"RSNP");
        assert_eq!(unmarshal(&raw)?, aggregate);
    }
    Ok(())
}

#[test]
fn test_marshal_is_deterministic() -> Result<()> {
    let aggregate = SnapshotAggregate::new(vec![viewer(), broadcaster()]);
    assert_eq!(marshal(&aggregate)?, marshal(&aggregate.clone())?);
    Ok(())
}

#[test]
fn test_unmarshal_rejects_corruption() -> Result<()> {
    let raw = marshal(&SnapshotAggregate::new(vec![viewer()]))?;

    let mut flipped = raw.clone();
    let last = flipped.len() - 1;
    flipped[last] ^= 0x01;

    let mut bad_magic = raw.clone();
    bad_magic[0] = b'X';

    let mut trailing = raw.clone();
    trailing.push(0);

    let tests = vec![
        ("empty", vec![]),
        ("header only", raw[..SNAPSHOT_HEADER_SIZE - 1].to_vec()),
        ("truncated", raw[..raw.len() - 3].to_vec()),
        ("flipped", flipped),
        ("bad magic", bad_magic),
        ("trailing", trailing),
    ];
    for (name, buf) in tests {
        match unmarshal(&buf) {
            Err(Error::ErrSnapshotCorrupted(_)) => {}
            other => panic!("{name}: expected ErrSnapshotCorrupted, got {other:?}"),
        }
    }

    let mut future = raw;
    future[4..6].copy_from_slice(&2u16.to_be_bytes());
    assert_eq!(unmarshal(&future), Err(Error::ErrSnapshotVersion(2)));

    Ok(())
}

#[test]
fn test_unmarshal_validates_records() -> Result<()> {
    let mut invalid = broadcaster();
    invalid.credentials.ufrag.clear();
    let raw = marshal(&SnapshotAggregate::new(vec![invalid]))?;

    assert!(matches!(
        unmarshal(&raw),
        Err(Error::ErrSnapshotInvalid(_))
    ));
    Ok(())
}

#[test]
fn test_srtp_ssrc_states() -> Result<()> {
    let state = SrtpSsrcState {
        index: 70000,
        rollover_has_processed: true,
        replay: None,
    };
    let mut snapshot = broadcaster();
    snapshot.srtp_state.insert(1001, state.serialize()?);

    let states = snapshot.srtp_ssrc_states()?;
    assert_eq!(states.get(&1001), Some(&state));

    snapshot.srtp_state.insert(2002, vec![]);
    assert!(matches!(
        snapshot.srtp_ssrc_states(),
        Err(Error::ErrSrtpStateInvalid(_))
    ));
    Ok(())
}
