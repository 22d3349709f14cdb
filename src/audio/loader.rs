// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decodes audio files into [`PreSampledSound`]s.
//!
//! Sounds are decoded fully at load time and cached by path, so every
//! instance of a sound shares one buffer.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

use super::error::AudioError;
use super::sound::PreSampledSound;

/// Loads and caches sounds.
#[derive(Default)]
pub struct SoundLoader {
    cache: HashMap<PathBuf, Arc<PreSampledSound>>,
}

impl SoundLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a sound from a file, returning the cached copy if it was loaded before.
    pub fn load(&mut self, path: &Path) -> Result<Arc<PreSampledSound>, AudioError> {
        if let Some(sound) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sound");
            return Ok(Arc::clone(sound));
        }

        info!(path = ?path, "Loading sound into memory");
        let sound = Arc::new(decode_file(path)?);

        info!(
            path = ?path,
            channels = sound.channels(),
            sample_rate = sound.sample_rate(),
            duration_ms = sound.duration().as_millis(),
            memory_kb = sound.memory_size() / 1024,
            "Sound loaded"
        );

        self.cache.insert(path.to_path_buf(), Arc::clone(&sound));
        Ok(sound)
    }

    /// Number of cached sounds.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns the total memory used by cached sounds.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }
}

impl std::fmt::Debug for SoundLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundLoader")
            .field("cached_sounds", &self.cache.len())
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes the first audio track of a file into interleaved f32 samples.
fn decode_file(path: &Path) -> Result<PreSampledSound, AudioError> {
    let file = File::open(path)
        .map_err(|e| std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::InvalidFormat(format!("{}: no audio track", path.display())))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let sample_rate = sample_rate.ok_or_else(|| {
        AudioError::InvalidFormat(format!("{}: unknown sample rate", path.display()))
    })?;
    let channels = channels.ok_or_else(|| {
        AudioError::InvalidFormat(format!("{}: unknown channel count", path.display()))
    })?;

    PreSampledSound::new(samples, sample_rate, channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::assert_close;

    fn write_wav(path: &Path, channels: u16, samples: &[f32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for sample in samples {
            writer.write_sample(*sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..200).map(|i| (i as f32 / 200.0) - 0.5).collect();
        write_wav(&path, 2, &samples);

        let mut loader = SoundLoader::new();
        let sound = loader.load(&path).unwrap();

        assert_eq!(sound.sample_rate(), 44100);
        assert_eq!(sound.channels(), 2);
        assert_eq!(sound.channel_sample_count(), 100);
        for (actual, expected) in sound.samples().iter().zip(samples.iter()) {
            assert_close(*actual, *expected);
        }
    }

    #[test]
    fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("click.wav");
        write_wav(&path, 1, &[1.0, 0.0, 0.0, 0.0]);

        let mut loader = SoundLoader::new();
        let first = loader.load(&path).unwrap();
        let second = loader.load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.len(), 1);
        assert_eq!(loader.total_memory_usage(), first.memory_size());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = SoundLoader::new();
        let result = loader.load(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(AudioError::Io(_))));
        assert!(loader.is_empty());
    }
}
