use anyhow::{Context, Result};
use hound::WavReader;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use super::backend::{AudioFrame, StreamFormat};

/// Length and native format of an encoded asset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetInfo {
    pub duration: Duration,
    pub format: StreamFormat,
}

impl AssetInfo {
    /// Probe any container symphonia understands and check a decoder exists
    pub fn probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path)
            .with_context(|| format!("Failed to open audio asset: {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .with_context(|| format!("Unrecognised audio container: {}", path.display()))?;

        let track = probed
            .format
            .default_track()
            .context("Audio asset has no playable track")?;
        let params = &track.codec_params;

        symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .context("No decoder for audio track")?;

        let sample_rate = params.sample_rate.context("Audio track has no sample rate")?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(1);
        let frames = params.n_frames.context("Audio track length is unknown")?;

        let info = Self {
            duration: Duration::from_secs_f64(frames as f64 / sample_rate as f64),
            format: StreamFormat {
                sample_rate,
                channels,
            },
        };

        debug!(
            "Probed {}: {:.2}s, {}Hz, {} channels",
            path.display(),
            info.duration.as_secs_f64(),
            sample_rate,
            channels
        );

        Ok(info)
    }
}

/// A fully loaded PCM WAV file
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split the file into consecutive frames of `frame_ms` milliseconds
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let per_frame = (self.sample_rate as u64 * frame_ms / 1000) as usize
            * self.channels.max(1) as usize;
        if per_frame == 0 {
            return Vec::new();
        }

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}
