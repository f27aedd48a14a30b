//! Source decoding: encoded bytes to a [`SampleBuffer`].
//!
//! The container is sniffed from the leading bytes. WAV is read with
//! `hound`; MP3 goes through `minimp3` when the `mp3` feature is enabled.
//! Sources with more than two channels keep their first two.

use std::io::Cursor;

use crate::dsp::buffer::SampleBuffer;
use crate::error::{SpatialError, SpatialResult};

/// Container detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Mp4,
}

impl Container {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Some(Container::Wav);
        }
        if bytes.starts_with(b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0) {
            return Some(Container::Mp3);
        }
        if bytes.starts_with(b"fLaC") {
            return Some(Container::Flac);
        }
        if bytes.starts_with(b"OggS") {
            return Some(Container::Ogg);
        }
        if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            return Some(Container::Mp4);
        }
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            Container::Wav => "wav",
            Container::Mp3 => "mp3",
            Container::Flac => "flac",
            Container::Ogg => "ogg",
            Container::Mp4 => "m4a",
        }
    }
}

/// Decode an encoded audio file into planar f32 samples.
pub fn decode_audio(bytes: &[u8]) -> SpatialResult<SampleBuffer> {
    match Container::sniff(bytes) {
        Some(Container::Wav) => decode_wav(bytes),
        Some(Container::Mp3) => decode_mp3(bytes),
        Some(other) => Err(SpatialError::UnsupportedFormat(format!(
            "{} sources cannot be decoded by this build",
            other.name()
        ))),
        None => Err(SpatialError::Decode("unrecognized audio format".into())),
    }
}

fn decode_wav(bytes: &[u8]) -> SpatialResult<SampleBuffer> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    deinterleave(&samples, spec.channels as usize, spec.sample_rate)
}

#[cfg(feature = "mp3")]
fn decode_mp3(bytes: &[u8]) -> SpatialResult<SampleBuffer> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples: Vec<f32> = Vec::new();
    let mut layout: Option<(usize, u32)> = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let frame_layout = (frame.channels, frame.sample_rate.max(0) as u32);
                match layout {
                    None => layout = Some(frame_layout),
                    Some(l) if l != frame_layout => {
                        log::warn!("skipping mp3 frame with layout {frame_layout:?}, stream started as {l:?}");
                        continue;
                    }
                    Some(_) => {}
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(SpatialError::Decode(e.to_string())),
        }
    }

    let (channels, sample_rate) = layout.ok_or_else(|| SpatialError::Decode("mp3 stream has no frames".into()))?;
    deinterleave(&samples, channels, sample_rate)
}

#[cfg(not(feature = "mp3"))]
fn decode_mp3(_bytes: &[u8]) -> SpatialResult<SampleBuffer> {
    Err(SpatialError::UnsupportedFormat(
        "mp3 decoding requires the `mp3` feature".into(),
    ))
}

/// Split interleaved samples into at most two planar channels.
fn deinterleave(samples: &[f32], channels: usize, sample_rate: u32) -> SpatialResult<SampleBuffer> {
    if channels == 0 {
        return Err(SpatialError::Decode("source reports zero channels".into()));
    }
    let kept = channels.min(2);
    if channels > 2 {
        log::warn!("source has {channels} channels; keeping the first two");
    }

    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); kept];
    for frame in samples.chunks_exact(channels) {
        for (ch, out) in planar.iter_mut().enumerate() {
            out.push(frame[ch]);
        }
    }
    SampleBuffer::from_channels(planar, sample_rate)
}


#[cfg(all(test, feature = "mp3"))]
mod mp3_tests {
    use super::*;

    const JOINT_STEREO: u8 = 0x64;
    const MONO: u8 = 0xC4;
    const SAMPLES_PER_FRAME: usize = 1152;

    /// Silent MPEG-1 Layer III frames, 128 kbps at 44.1 kHz (417 bytes,
    /// zeroed side info and main data).
    fn silent_frames(mode: u8, count: usize) -> Vec<u8> {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, mode]);
        frame.repeat(count)
    }

    #[test]
    fn decodes_silent_stereo_stream() {
        let bytes = silent_frames(JOINT_STEREO, 8);
        assert_eq!(Container::sniff(&bytes), Some(Container::Mp3));

        let decoded = decode_audio(&bytes).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.sample_rate(), 44100);
        assert!(decoded.frame_count() > 0);
        assert_eq!(decoded.frame_count() % SAMPLES_PER_FRAME, 0);
        assert!(decoded.peak() < 1e-3);
    }

    #[test]
    fn frames_with_a_different_layout_are_skipped() {
        let mut bytes = silent_frames(JOINT_STEREO, 6);
        bytes.extend(silent_frames(MONO, 4));

        let decoded = decode_audio(&bytes).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert!(decoded.frame_count() > 0);
        assert!(decoded.frame_count() <= 6 * SAMPLES_PER_FRAME);
    }

    #[test]
    fn tag_without_frames_is_a_decode_error() {
        let mut bytes = b"ID3\x04\0\0\0\0\0\0".to_vec();
        bytes.extend([0u8; 64]);

        let err = decode_audio(&bytes).unwrap_err();
        assert!(matches!(err, SpatialError::Decode(_)));
        assert!(err.to_string().contains("no frames"), "{err}");
    }
}
