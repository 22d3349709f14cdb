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

//! Decoded, immutable audio shared by every instance playing it.

use std::sync::Arc;
use std::time::Duration;

use super::error::AudioError;
use super::format::WaveFormat;
use super::instance::SoundInstance;

/// A fully decoded sound held in memory as interleaved f32 samples.
///
/// The sample buffer always holds a whole number of frames. Instances share the
/// sound through an `Arc`, so it stays alive for as long as anything plays it.
#[derive(Debug)]
pub struct PreSampledSound {
    /// Interleaved sample data.
    samples: Vec<f32>,
    /// Sample rate and channel count of the data.
    format: WaveFormat,
}

impl PreSampledSound {
    /// Creates a sound from interleaved samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        let format = WaveFormat::new(sample_rate, channels)?;
        if samples.len() % channels as usize != 0 {
            return Err(AudioError::InvalidSampleCount {
                count: samples.len(),
                channels,
            });
        }

        Ok(Self { samples, format })
    }

    /// Creates a new instance that plays this sound.
    pub fn create_instance(self: &Arc<Self>) -> SoundInstance {
        SoundInstance::new(Arc::clone(self))
    }

    /// Returns the format of the sample data.
    pub fn format(&self) -> WaveFormat {
        self.format
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Returns the number of channels.
    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    /// Returns the raw interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the number of frames (samples per channel).
    pub fn channel_sample_count(&self) -> usize {
        self.samples.len() / self.format.channels as usize
    }

    /// Returns the playback length at the native sample rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.channel_sample_count() as f64 / self.sample_rate() as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Reads one channel of one frame. Anything outside the sound reads as silence.
    #[inline]
    pub(crate) fn sample_at(&self, frame: i64, channel: usize) -> f32 {
        if frame < 0 {
            return 0.0;
        }
        let index = frame as usize * self.format.channels as usize + channel;
        self.samples.get(index).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_partial_frames() {
        let result = PreSampledSound::new(vec![0.0; 3], 44100, 2);
        assert!(matches!(
            result,
            Err(AudioError::InvalidSampleCount {
                count: 3,
                channels: 2
            })
        ));
    }

    #[test]
    fn test_new_rejects_bad_format() {
        assert!(PreSampledSound::new(vec![0.0; 4], 0, 2).is_err());
        assert!(PreSampledSound::new(vec![0.0; 4], 44100, 0).is_err());
    }

    #[test]
    fn test_derived_lengths() {
        let sound = PreSampledSound::new(vec![0.0; 44100 * 2], 44100, 2).unwrap();
        assert_eq!(sound.channel_sample_count(), 44100);
        assert_eq!(sound.duration(), Duration::from_secs(1));
        assert_eq!(sound.memory_size(), 44100 * 2 * 4);
    }

    #[test]
    fn test_sample_at_pads_with_silence() {
        let sound = PreSampledSound::new(vec![0.1, 0.2, 0.3, 0.4], 44100, 2).unwrap();
        assert_eq!(sound.sample_at(0, 0), 0.1);
        assert_eq!(sound.sample_at(1, 1), 0.4);
        assert_eq!(sound.sample_at(-1, 0), 0.0);
        assert_eq!(sound.sample_at(2, 0), 0.0);
    }

    #[test]
    fn test_empty_sound() {
        let sound = PreSampledSound::new(Vec::new(), 22050, 1).unwrap();
        assert_eq!(sound.channel_sample_count(), 0);
        assert_eq!(sound.duration(), Duration::ZERO);
    }
}
