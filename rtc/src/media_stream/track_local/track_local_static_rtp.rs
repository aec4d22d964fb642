use std::sync::Mutex;

use super::*;
use shared::error::{Error, flatten_errs};

/// TrackLocalStaticRTP is a TrackLocal that has a pre-set codec and accepts RTP packets.
/// It is shared by every peer connection that sends it; each sender owns one binding.
#[derive(Debug)]
pub struct TrackLocalStaticRTP {
    codec: RTCRtpCodecCapability,
    id: String,
    stream_id: String,
    bindings: Mutex<Vec<TrackLocalContext>>,
}

impl TrackLocalStaticRTP {
    pub fn new(codec: RTCRtpCodecCapability, id: String, stream_id: String) -> Self {
        TrackLocalStaticRTP {
            codec,
            id,
            stream_id,
            bindings: Mutex::new(vec![]),
        }
    }

    pub fn bindings(&self) -> Result<Vec<TrackLocalContext>> {
        Ok(self.bindings.lock()?.clone())
    }

    /// Hands `packet` to `write` once per binding. Errors of single bindings do not stop
    /// the fan-out; they are returned together afterwards.
    pub fn write_rtp<F>(&self, packet: &[u8], mut write: F) -> Result<usize>
    where
        F: FnMut(&TrackLocalContext, &[u8]) -> Result<usize>,
    {
        let bindings = self.bindings()?;

        let mut n = 0;
        let mut write_errs = vec![];
        for b in &bindings {
            match write(b, packet) {
                Ok(m) => n += m,
                Err(err) => write_errs.push(err),
            }
        }

        flatten_errs(write_errs)?;
        Ok(n)
    }
}

impl TrackLocal for TrackLocalStaticRTP {
    fn bind(&self, ctx: TrackLocalContext) -> Result<()> {
        let mut bindings = self.bindings.lock()?;
        if bindings.iter().any(|b| b.ssrc == ctx.ssrc) {
            return Err(Error::ErrDuplicateSsrc(ctx.ssrc));
        }
        bindings.push(ctx);
        Ok(())
    }

    fn unbind(&self, ssrc: u32) -> Result<()> {
        let mut bindings = self.bindings.lock()?;
        let before = bindings.len();
        bindings.retain(|b| b.ssrc != ssrc);
        if bindings.len() == before {
            return Err(Error::ErrSsrcNotFound(ssrc));
        }
        Ok(())
    }

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn stream_id(&self) -> &str {
        self.stream_id.as_str()
    }

    fn kind(&self) -> RTPCodecType {
        self.codec.kind()
    }

    fn codec(&self) -> &RTCRtpCodecCapability {
        &self.codec
    }
}
