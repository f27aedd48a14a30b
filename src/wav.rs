//! 16-bit PCM WAV encoding, plus a minimal reader for our own output.

use crate::dsp::buffer::SampleBuffer;
use crate::error::{SpatialError, SpatialResult};

const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// Quantize one sample to 16-bit PCM. Input is clamped to [-1, 1];
/// negative values scale by 32768 and positive by 32767.
pub fn to_pcm16(sample: f32) -> i16 {
    let v = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if v < 0.0 {
        (v * 32768.0) as i16
    } else {
        (v * 32767.0) as i16
    }
}

/// Encode a buffer as a canonical 44-byte-header RIFF/WAVE file,
/// samples interleaved frame-major.
pub fn encode_wav(buffer: &SampleBuffer) -> SpatialResult<Vec<u8>> {
    let channels = buffer.channel_count() as u16;
    let sample_rate = buffer.sample_rate();
    let frames = buffer.frame_count();

    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate
        .checked_mul(block_align as u32)
        .ok_or_else(|| SpatialError::Encoding("byte rate overflows u32".into()))?;
    let data_size = frames
        .checked_mul(block_align as usize)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| n.checked_add(36).is_some())
        .ok_or_else(|| SpatialError::Encoding(format!("{frames} frames exceed the WAV size limit")))?;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(HEADER_LEN + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for frame in 0..frames {
        for channel in buffer.channels() {
            buf.extend_from_slice(&to_pcm16(channel[frame]).to_le_bytes());
        }
    }

    Ok(buf)
}

/// Read a 16-bit PCM WAV back into a buffer.
///
/// Walks the chunk list so files with extra chunks before `data` still
/// parse. Only 16-bit integer PCM is accepted; use
/// [`crate::decode::decode_audio`] for anything else.
pub fn read_pcm16(bytes: &[u8]) -> SpatialResult<SampleBuffer> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(SpatialError::Decode("not a RIFF/WAVE file".into()));
    }

    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut pos = 12;
    while bytes.len().saturating_sub(pos) >= 8 {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]]) as usize;
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(size).min(bytes.len());
        let body = &bytes[body_start..body_end];

        match id {
            b"fmt " => {
                if body.len() < 16 {
                    return Err(SpatialError::Decode("fmt chunk too short".into()));
                }
                let format = u16::from_le_bytes([body[0], body[1]]);
                let channels = u16::from_le_bytes([body[2], body[3]]);
                let rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                let bits = u16::from_le_bytes([body[14], body[15]]);
                fmt = Some((format, channels, rate, bits));
            }
            b"data" => {
                let (format, channels, rate, bits) =
                    fmt.ok_or_else(|| SpatialError::Decode("data chunk before fmt chunk".into()))?;
                if format != 1 || bits != BITS_PER_SAMPLE {
                    return Err(SpatialError::Decode(format!(
                        "expected 16-bit PCM, got format {format} at {bits} bits"
                    )));
                }
                let samples: Vec<f32> = body
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
                    .collect();
                return SampleBuffer::from_interleaved(&samples, channels as usize, rate);
            }
            _ => {}
        }

        // chunks are word-aligned
        pos = body_start.saturating_add(size.saturating_add(size & 1));
    }

    Err(SpatialError::Decode("no data chunk".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(b: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([b[at], b[at + 1]])
    }

    fn u32_at(b: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    #[test]
    fn single_full_scale_sample() {
        let buf = SampleBuffer::mono(vec![1.0], 8000).unwrap();
        let wav = encode_wav(&buf).unwrap();
        assert_eq!(wav.len(), 46);
        assert_eq!(&wav[44..46], &[0xFF, 0x7F]);
        assert_eq!(u32_at(&wav, 4), 38);
        assert_eq!(u32_at(&wav, 40), 2);
    }

    #[test]
    fn header_fields() {
        let buf = SampleBuffer::silent(2, 10, 44100).unwrap();
        let wav = encode_wav(&buf).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32_at(&wav, 16), 16);
        assert_eq!(u16_at(&wav, 20), 1);
        assert_eq!(u16_at(&wav, 22), 2);
        assert_eq!(u32_at(&wav, 24), 44100);
        assert_eq!(u32_at(&wav, 28), 44100 * 4);
        assert_eq!(u16_at(&wav, 32), 4);
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 40);
        assert_eq!(wav.len(), 44 + 40);
    }

    #[test]
    fn quantization_is_asymmetric_and_clamped() {
        assert_eq!(to_pcm16(1.0), 32767);
        assert_eq!(to_pcm16(-1.0), -32768);
        assert_eq!(to_pcm16(2.5), 32767);
        assert_eq!(to_pcm16(-7.0), -32768);
        assert_eq!(to_pcm16(0.0), 0);
        assert_eq!(to_pcm16(f32::NAN), 0);
    }

    #[test]
    fn interleaves_frame_major() {
        let buf = SampleBuffer::stereo(vec![1.0, 0.0], vec![-1.0, 0.5], 8000).unwrap();
        let wav = encode_wav(&buf).unwrap();
        let data: Vec<i16> = wav[44..].chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();
        assert_eq!(data, vec![32767, -32768, 0, 16383]);
    }

    #[test]
    fn reads_back_within_one_step() {
        let left: Vec<f32> = (0..64).map(|i| (i as f32 / 32.0) - 1.0).collect();
        let right: Vec<f32> = left.iter().map(|s| -s * 0.5).collect();
        let buf = SampleBuffer::stereo(left.clone(), right, 22050).unwrap();
        let back = read_pcm16(&encode_wav(&buf).unwrap()).unwrap();
        assert_eq!(back.sample_rate(), 22050);
        assert_eq!(back.channel_count(), 2);
        for (a, b) in left.iter().zip(back.channel(0)) {
            assert!((a - b).abs() <= 1.0 / 32767.0, "{a} vs {b}");
        }
    }

    #[test]
    fn reader_skips_unknown_chunks() {
        let buf = SampleBuffer::mono(vec![0.5, -0.5], 8000).unwrap();
        let wav = encode_wav(&buf).unwrap();
        let mut patched = wav[..36].to_vec();
        patched.extend_from_slice(b"LIST");
        patched.extend_from_slice(&3u32.to_le_bytes());
        patched.extend_from_slice(&[1, 2, 3, 0]);
        patched.extend_from_slice(&wav[36..]);
        let back = read_pcm16(&patched).unwrap();
        assert_eq!(back.frame_count(), 2);
    }

    #[test]
    fn oversized_chunk_ends_the_walk() {
        let buf = SampleBuffer::mono(vec![0.25], 8000).unwrap();
        let wav = encode_wav(&buf).unwrap();
        let mut patched = wav[..12].to_vec();
        patched.extend_from_slice(b"junk");
        patched.extend_from_slice(&u32::MAX.to_le_bytes());
        patched.extend_from_slice(&wav[12..]);

        let err = read_pcm16(&patched).unwrap_err();
        assert!(err.to_string().contains("no data chunk"), "{err}");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(read_pcm16(b"nope"), Err(SpatialError::Decode(_))));
    }
}
