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

use std::fmt;

use super::error::AudioError;

/// The format every engine pull is mixed in: 44.1kHz, stereo, 32-bit float.
pub const OUTPUT_FORMAT: WaveFormat = WaveFormat {
    sample_rate: 44100,
    channels: 2,
};

/// The shape of an interleaved float sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl WaveFormat {
    /// Creates a new WaveFormat
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        // Basic sanity check - let the output device decide what's actually supported
        if sample_rate == 0 {
            return Err(AudioError::InvalidFormat(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(AudioError::InvalidFormat(
                "channel count must be greater than 0".to_string(),
            ));
        }

        Ok(WaveFormat {
            sample_rate,
            channels,
        })
    }

    /// Number of interleaved samples needed to hold the given duration.
    pub fn samples_for(&self, seconds: f64) -> usize {
        let frames = (seconds.max(0.0) * self.sample_rate as f64) as usize;
        frames * self.channels as usize
    }

    /// Highest frequency representable at this sample rate.
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }
}

impl Default for WaveFormat {
    fn default() -> Self {
        OUTPUT_FORMAT
    }
}

impl fmt::Display for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}ch/float", self.sample_rate, self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_format_new() {
        let format = WaveFormat::new(48000, 1).unwrap();
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.channels, 1);
    }

    #[test]
    fn test_wave_format_new_invalid() {
        assert!(WaveFormat::new(0, 2).is_err());
        assert!(WaveFormat::new(44100, 0).is_err());
    }

    #[test]
    fn test_output_format_is_default() {
        let format = WaveFormat::default();
        assert_eq!(format, OUTPUT_FORMAT);
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.channels, 2);
    }

    #[test]
    fn test_samples_for() {
        assert_eq!(OUTPUT_FORMAT.samples_for(1.0), 88200);
        assert_eq!(OUTPUT_FORMAT.samples_for(0.5), 44100);
        assert_eq!(OUTPUT_FORMAT.samples_for(-1.0), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", OUTPUT_FORMAT), "44100Hz/2ch/float");
    }
}
