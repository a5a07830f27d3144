//! Audio fragment accumulation and container packaging.
//!
//! The session routes inbound base64 PCM fragments and transcript text
//! fragments here in arrival order; the transport guarantees in-order
//! delivery, so no reordering happens on this side. `finalize` turns the
//! accumulated fragments into a self-describing WAV byte buffer plus the
//! concatenated transcript.

use base64::prelude::*;

use crate::errors::{SessionResult, SynthesisError};

/// Fixed size of the RIFF/WAVE header this crate emits.
pub const WAV_HEADER_LEN: usize = 44;

/// Terminal output of a successful generation.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Complete WAV container: 44-byte header followed by raw 16-bit mono
    /// PCM, decodable by any standard audio player.
    pub audio: Vec<u8>,
    /// Transcript fragments concatenated in arrival order.
    pub transcript: String,
}

/// Accumulates streamed audio and transcript fragments for one session.
///
/// Append-only; each session owns exactly one assembler, and the session's
/// event router applies fragments strictly one at a time.
#[derive(Debug, Default)]
pub struct AudioAssembler {
    fragments: Vec<String>,
    transcript: String,
}

impl AudioAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one base64-encoded PCM fragment.
    pub fn push_audio(&mut self, fragment: &str) {
        self.fragments.push(fragment.to_string());
    }

    /// Append one transcript text fragment.
    pub fn push_transcript(&mut self, fragment: &str) {
        self.transcript.push_str(fragment);
    }

    /// True once at least one audio fragment has arrived.
    pub fn has_audio(&self) -> bool {
        !self.fragments.is_empty()
    }

    /// Decode the accumulated fragments and wrap them in a WAV container.
    ///
    /// Fails with [`SynthesisError::EmptyAudio`] if no audio fragment was
    /// ever appended.
    pub fn finalize(self, sample_rate_hz: u32) -> SessionResult<SynthesisResult> {
        if self.fragments.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        // Fragments arrive individually padded, so decode per fragment
        // rather than decoding one concatenated string.
        let mut pcm = Vec::new();
        for fragment in &self.fragments {
            let bytes = BASE64_STANDARD.decode(fragment.as_bytes()).map_err(|e| {
                SynthesisError::ProtocolError(format!("invalid base64 audio fragment: {e}"))
            })?;
            pcm.extend_from_slice(&bytes);
        }

        Ok(SynthesisResult {
            audio: wav_container(&pcm, sample_rate_hz),
            transcript: self.transcript,
        })
    }
}

/// Wrap raw 16-bit mono little-endian PCM in a standard WAV container.
pub fn wav_container(pcm: &[u8], sample_rate_hz: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;

    let byte_rate = sample_rate_hz * u32::from(CHANNELS) * u32::from(BITS_PER_SAMPLE) / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let data_len = pcm.len() as u32;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM format tag
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate_hz.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn test_finalize_empty_fails() {
        let assembler = AudioAssembler::new();
        assert!(matches!(
            assembler.finalize(24_000).unwrap_err(),
            SynthesisError::EmptyAudio
        ));
    }

    #[test]
    fn test_transcript_alone_is_not_audio() {
        let mut assembler = AudioAssembler::new();
        assembler.push_transcript("hello");
        assert!(!assembler.has_audio());
        assert!(matches!(
            assembler.finalize(24_000).unwrap_err(),
            SynthesisError::EmptyAudio
        ));
    }

    #[test]
    fn test_finalize_lengths() {
        let mut assembler = AudioAssembler::new();
        // "AAA=" and "BBB=" each decode to 2 bytes.
        assembler.push_audio("AAA=");
        assembler.push_audio("BBB=");
        let result = assembler.finalize(24_000).unwrap();

        assert_eq!(result.audio.len(), 4 + WAV_HEADER_LEN);
        assert_eq!(u32_at(&result.audio, 40), 4); // data chunk length
        assert_eq!(u32_at(&result.audio, 4), 36 + 4); // RIFF chunk length
    }

    #[test]
    fn test_wav_header_fields() {
        let pcm = vec![0u8; 480];
        let wav = wav_container(&pcm, 24_000);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32_at(&wav, 16), 16); // fmt chunk size
        assert_eq!(u16_at(&wav, 20), 1); // PCM
        assert_eq!(u16_at(&wav, 22), 1); // channels
        assert_eq!(u32_at(&wav, 24), 24_000); // sample rate
        assert_eq!(u32_at(&wav, 28), 48_000); // byte rate
        assert_eq!(u16_at(&wav, 32), 2); // block align
        assert_eq!(u16_at(&wav, 34), 16); // bits per sample
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 480);
        assert_eq!(&wav[WAV_HEADER_LEN..], &pcm[..]);
    }

    #[test]
    fn test_fragment_order_preserved() {
        let mut assembler = AudioAssembler::new();
        // "AQ==" -> [1], "Ag==" -> [2]
        assembler.push_audio("AQ==");
        assembler.push_audio("Ag==");
        assembler.push_transcript("first ");
        assembler.push_transcript("second");
        let result = assembler.finalize(16_000).unwrap();

        assert_eq!(&result.audio[WAV_HEADER_LEN..], &[1, 2]);
        assert_eq!(result.transcript, "first second");
    }

    #[test]
    fn test_invalid_base64_is_protocol_error() {
        let mut assembler = AudioAssembler::new();
        assembler.push_audio("not base64!!");
        assert!(matches!(
            assembler.finalize(24_000).unwrap_err(),
            SynthesisError::ProtocolError(_)
        ));
    }
}
