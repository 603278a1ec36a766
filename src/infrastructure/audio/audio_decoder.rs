use std::io::Cursor;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::TranscriptionError;

/// Whisper consumes 16 kHz mono.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

const RESAMPLE_CHUNK: usize = 1024;

/// Mono PCM at [`TARGET_SAMPLE_RATE`], plus what the source looked like.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub source_rate: u32,
    pub source_channels: usize,
}

impl PcmAudio {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / TARGET_SAMPLE_RATE as f32
    }
}

/// Decodes any container symphonia can probe into [`PcmAudio`].
///
/// `extension` only seeds the probe; the container is still sniffed from
/// its bytes, so a mislabelled upload decodes as whatever it really is.
pub fn decode_to_pcm(
    data: Vec<u8>,
    extension: Option<&str>,
) -> Result<PcmAudio, TranscriptionError> {
    if data.is_empty() {
        return Err(TranscriptionError::DecodingFailed(
            "audio payload is empty".to_string(),
        ));
    }

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let source = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| TranscriptionError::UnsupportedFormat(format!("probe: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| TranscriptionError::DecodingFailed("no audio track found".to_string()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let source_rate = params
        .sample_rate
        .ok_or_else(|| TranscriptionError::DecodingFailed("unknown sample rate".to_string()))?;
    let source_channels = params.channels.map(|c| c.count()).unwrap_or(1).max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| TranscriptionError::UnsupportedFormat(format!("codec: {}", e)))?;

    let capacity = params.n_frames.unwrap_or(0) as usize;
    let mono = read_mono(format.as_mut(), decoder.as_mut(), track_id, capacity)?;
    if mono.is_empty() {
        return Err(TranscriptionError::DecodingFailed(
            "no audio samples decoded".to_string(),
        ));
    }

    let samples = if source_rate == TARGET_SAMPLE_RATE {
        mono
    } else {
        resample(&mono, source_rate)?
    };

    let audio = PcmAudio {
        samples,
        source_rate,
        source_channels,
    };

    tracing::debug!(
        source_rate,
        source_channels,
        samples = audio.samples.len(),
        duration_secs = audio.duration_secs(),
        "Audio decoded"
    );

    Ok(audio)
}

/// Pulls every packet of `track_id` and averages channels down to one.
fn read_mono(
    format: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
    capacity: usize,
) -> Result<Vec<f32>, TranscriptionError> {
    let mut mono = Vec::with_capacity(capacity);
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(TranscriptionError::DecodingFailed(format!("packet: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = %e, "Skipping corrupt audio frame");
                continue;
            }
            Err(e) => return Err(TranscriptionError::DecodingFailed(format!("decode: {}", e))),
        };
        if decoded.frames() == 0 {
            continue;
        }

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let needed = decoded.capacity() as u64;
        if buffer
            .as_ref()
            .is_none_or(|b| (b.capacity() as u64) < needed * channels as u64)
        {
            buffer = Some(SampleBuffer::new(needed, spec));
        }
        let Some(buf) = buffer.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        if channels == 1 {
            mono.extend_from_slice(buf.samples());
        } else {
            mono.extend(
                buf.samples()
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    Ok(mono)
}

fn resample(samples: &[f32], from_rate: u32) -> Result<Vec<f32>, TranscriptionError> {
    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        TARGET_SAMPLE_RATE as usize,
        RESAMPLE_CHUNK,
        2,
        1,
    )
    .map_err(|e| TranscriptionError::DecodingFailed(format!("resampler init: {}", e)))?;

    let chunk_len = resampler.input_frames_next();
    let expected_len =
        (samples.len() as u64 * TARGET_SAMPLE_RATE as u64 / from_rate as u64) as usize;
    let mut output = Vec::with_capacity(expected_len + resampler.output_frames_max());
    let mut padded = vec![0.0f32; chunk_len];

    for chunk in samples.chunks(chunk_len) {
        let input: &[f32] = if chunk.len() == chunk_len {
            chunk
        } else {
            padded[..chunk.len()].copy_from_slice(chunk);
            padded[chunk.len()..].fill(0.0);
            &padded
        };

        let frames = resampler
            .process(&[input], None)
            .map_err(|e| TranscriptionError::DecodingFailed(format!("resample: {}", e)))?;
        if let Some(channel) = frames.first() {
            output.extend_from_slice(channel);
        }
    }

    // The tail chunk was zero padded
    output.truncate(expected_len);
    Ok(output)
}
