#![allow(dead_code)]

use std::io;
use std::net;
use std::num::ParseIntError;
use std::string::FromUtf8Error;
use std::time::SystemTimeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: short")]
    ErrBufferShort,
    #[error("already closed")]
    ErrAlreadyClosed,
    #[error("end port is less than the start")]
    ErrEndPortLessThanStart,
    #[error("port space exhausted")]
    ErrPortSpaceExhausted,
    #[error("port {0} is not available for binding")]
    ErrPortUnavailable(u16),
    #[error("mutex poison: {0}")]
    PoisonError(String),

    //ExportKeyingMaterial errors
    #[error("tls handshake is in progress")]
    HandshakeInProgress,
    #[error("context is not supported for export_keying_material")]
    ContextUnsupported,
    #[error("export_keying_material can not be used with a reserved label")]
    ReservedExportKeyingMaterial,
    #[error("no cipher suite for export_keying_material")]
    CipherSuiteUnset,

    //ICE errors
    /// Indicates local username fragment insufficient bits are provided.
    /// Have to be at least 24 bits long.
    #[error("local username fragment is less than 24 bits long")]
    ErrLocalUfragInsufficientBits,
    /// Indicates local passoword insufficient bits are provided.
    /// Have to be at least 128 bits long.
    #[error("local password is less than 128 bits long")]
    ErrLocalPwdInsufficientBits,
    /// Indicates agent does not have a valid candidate pair.
    #[error("no candidate pairs available")]
    ErrNoCandidatePairs,
    /// Indicates no remote address is known for the selected pair yet.
    #[error("no remote address selected")]
    ErrNoRemoteAddress,
    /// Indicates agent connection was closed.
    #[error("the agent is closed")]
    ErrClosed,
    /// Indicates the agent has no host candidate yet.
    #[error("no local candidate")]
    ErrNoLocalCandidate,
    /// Indicates a second, different host candidate was offered to the agent.
    #[error("the agent already has local candidate {0}")]
    ErrLocalCandidateExists(String),
    /// Indicates the USERNAME of a connectivity check is not ours.
    #[error("username mismatch")]
    ErrMismatchUsername,

    //DTLS errors
    #[error("conn is closed")]
    ErrConnClosed,
    #[error("handshake is in progress")]
    ErrHandshakeInProgress,
    #[error("invalid or unknown cipher suite")]
    ErrInvalidCipherSuite,
    #[error("attempted to start DTLSTransport that is not in new state")]
    ErrInvalidDTLSStart,
    #[error("dtls record epoch={0} seq={1}: replayed or too old")]
    ErrDtlsRecordReplayed(u16, u64),
    #[error("dtls record epoch={0} does not match the current remote epoch")]
    ErrDtlsRecordEpochMismatch(u16),
    #[error("dtls state: {0}")]
    ErrDtlsStateInvalid(String),

    //SRTP errors
    #[error("SRTP Master Key must be len {0}, got {1}")]
    SrtpMasterKeyLength(usize, usize),
    #[error("SRTP Salt must be len {0}, got {1}")]
    SrtpSaltLength(usize, usize),
    #[error("no such SRTP Profile {0:#06x}")]
    ErrNoSuchSrtpProfile(u16),
    #[error("failed to verify auth tag")]
    ErrFailedToVerifyAuthTag,
    #[error("srtp ssrc={0} index={1}: duplicated")]
    SrtpSsrcDuplicated(u32, u16),
    #[error("packet is too short to be rtp packet: {0} < {1}")]
    ErrTooShortRtp(usize, usize),
    #[error("exceeded the maximum number of packets for ssrc {0}")]
    ErrExceededMaxPackets(u32),
    #[error("invalid key length")]
    ErrInvalidKeyLength,
    #[error("srtp state: {0}")]
    ErrSrtpStateInvalid(String),

    //PeerConnection errors
    #[error("connection closed")]
    ErrConnectionClosed,
    #[error("operation can not be run in current signaling state")]
    ErrIncorrectSignalingState,
    #[error("remote description is not set")]
    ErrNoRemoteDescription,
    #[error("local description is not set")]
    ErrNoLocalDescription,
    #[error("sessionDescription contains no ice-ufrag")]
    ErrSessionDescriptionMissingIceUfrag,
    #[error("sessionDescription contains no ice-pwd")]
    ErrSessionDescriptionMissingIcePwd,
    #[error("sessionDescription contains no fingerprint")]
    ErrSessionDescriptionNoFingerprint,
    #[error("track kind {0} has no negotiated media section")]
    ErrNoMediaSectionForTrack(String),
    #[error("ssrc {0} is already used by another flow")]
    ErrDuplicateSsrc(u32),
    #[error("no outbound flow with ssrc {0}")]
    ErrSsrcNotFound(u32),
    #[error("srtp is not ready before dtls handshake completes")]
    ErrSrtpNotReady,
    #[error("certificate: {0}")]
    ErrCertificate(String),
    #[error("sdp: {0}")]
    Sdp(String),

    //Resume errors
    #[error("integrity violation: sender {0} has no negotiated encodings")]
    ErrSenderHasNoEncodings(String),
    #[error("integrity violation: session is {0}, only connected sessions can be captured")]
    ErrSessionNotConnected(String),
    #[error("integrity violation: stream key state does not match negotiated ssrcs: {0}")]
    ErrStreamKeyStateMismatch(String),
    #[error("integrity violation: snapshot is corrupted: {0}")]
    ErrSnapshotCorrupted(String),
    #[error("integrity violation: unsupported snapshot version {0}")]
    ErrSnapshotVersion(u16),
    #[error("integrity violation: invalid snapshot record: {0}")]
    ErrSnapshotInvalid(String),
    #[error("session {0} is not registered")]
    ErrSessionNotFound(u64),

    //Third Party Error
    #[error("parse ip: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("utf8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("{0}")]
    Std(#[source] StdError),

    //Other Errors
    #[error("Other SRTP Err: {0}")]
    OtherSrtpErr(String),
    #[error("Other ICE Err: {0}")]
    OtherIceErr(String),
    #[error("Other DTLS Err: {0}")]
    OtherDtlsErr(String),
    #[error("Other PeerConnection Err: {0}")]
    OtherPeerConnectionErr(String),
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn from_std<T>(error: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Error::Std(StdError(Box::new(error)))
    }

    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        if let Error::Std(s) = self {
            return s.0.downcast_ref();
        }

        None
    }

    /// Reports whether the error means captured or restored state can no longer be
    /// trusted. Such errors must reach process startup/shutdown; everything else is
    /// either a per-session transport failure or a retryable persistence failure.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Error::ErrSenderHasNoEncodings(_)
                | Error::ErrSessionNotConnected(_)
                | Error::ErrStreamKeyStateMismatch(_)
                | Error::ErrSnapshotCorrupted(_)
                | Error::ErrSnapshotVersion(_)
                | Error::ErrSnapshotInvalid(_)
                | Error::ErrPortUnavailable(_)
                | Error::ErrNoCandidatePairs
                | Error::ErrHandshakeInProgress
                | Error::ErrDuplicateSsrc(_)
                | Error::ErrDtlsStateInvalid(_)
                | Error::ErrSrtpStateInvalid(_)
                | Error::PoisonError(_)
        )
    }
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

/// An escape hatch to preserve stack traces when we don't know the error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StdError(pub Box<dyn std::error::Error + Send + Sync>);

impl PartialEq for StdError {
    fn eq(&self, _: &Self) -> bool {
        false
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::PoisonError(e.to_string())
    }
}

impl From<SystemTimeError> for Error {
    fn from(e: SystemTimeError) -> Self {
        Error::Other(e.to_string())
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_integrity_violation_classification() {
        let tests = vec![
            (Error::ErrSenderHasNoEncodings("audio".to_owned()), true),
            (Error::ErrSnapshotCorrupted("crc".to_owned()), true),
            (Error::ErrPortUnavailable(50000), true),
            (Error::ErrNoCandidatePairs, true),
            (
                Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
                false,
            ),
            (Error::ErrFailedToVerifyAuthTag, false),
            (Error::ErrConnectionClosed, false),
        ];

        for (err, expected) in tests {
            assert_eq!(err.is_integrity_violation(), expected, "testCase: {err}");
        }
    }

    #[test]
    fn test_io_error_compares_by_kind() {
        let a = Error::from(io::Error::new(io::ErrorKind::NotFound, "a"));
        let b = Error::from(io::Error::new(io::ErrorKind::NotFound, "b"));
        let c = Error::from(io::Error::new(io::ErrorKind::Other, "a"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_flatten_errs() {
        assert!(flatten_errs(Vec::<Error>::new()).is_ok());

        let err = flatten_errs(vec![Error::ErrClosed, Error::ErrConnClosed]).unwrap_err();
        assert_eq!(
            err,
            Error::Other("the agent is closed\nconn is closed".to_owned())
        );
    }
}
