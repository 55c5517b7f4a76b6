//! Raw PCM decoding for the transcoder's output format.

use std::path::Path;

use crate::{BeatSyncError, Result};

/// Bytes per 16-bit PCM frame (mono).
pub const PCM_S16_FRAME_BYTES: usize = 2;

/// Full-scale divisor for signed 16-bit samples. `-32768` maps to exactly
/// `-1.0`; `32767` maps to just under `1.0`.
pub const PCM_S16_DIVISOR: f32 = 32_768.0;

/// Decodes signed 16-bit little-endian mono PCM into normalised floats.
///
/// The buffer must hold a whole number of frames; a trailing partial frame
/// means the transcoder output was truncated and is reported against
/// `source`.
pub fn decode_s16le(bytes: &[u8], source: &Path) -> Result<Vec<f32>> {
    if bytes.len() % PCM_S16_FRAME_BYTES != 0 {
        return Err(BeatSyncError::decode(
            source,
            format!(
                "PCM stream length {} is not a multiple of {PCM_S16_FRAME_BYTES} bytes",
                bytes.len()
            ),
        ));
    }

    Ok(bytes
        .chunks_exact(PCM_S16_FRAME_BYTES)
        .map(|frame| decode_frame([frame[0], frame[1]]))
        .collect())
}

fn decode_frame(frame: [u8; PCM_S16_FRAME_BYTES]) -> f32 {
    f32::from(i16::from_le_bytes(frame)) / PCM_S16_DIVISOR
}
