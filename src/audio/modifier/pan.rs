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

use std::f32::consts::SQRT_2;

use super::Modifier;
use crate::audio::error::AudioError;
use crate::audio::format::WaveFormat;

/// Extra gain given to the near side at a hard pan, so a panned sound keeps
/// roughly the same perceived loudness (+3dB at the extremes).
const LOUDNESS_BOOST: f32 = SQRT_2 - 1.0;

/// Pan used when a caller supplies a non-finite value.
pub const DEFAULT_PAN: f32 = 0.0;

/// Clamps a pan to [-1, 1], mapping non-finite input to center.
pub fn sanitize_pan(pan: f32) -> f32 {
    if pan.is_finite() {
        pan.clamp(-1.0, 1.0)
    } else {
        DEFAULT_PAN
    }
}

/// Moves a stereo signal between the left and right channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanModifier {
    /// -1 is hard left, 0 is center, 1 is hard right.
    pan: f32,
}

impl PanModifier {
    pub fn new(pan: f32) -> Self {
        Self {
            pan: sanitize_pan(pan),
        }
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = sanitize_pan(pan);
    }

    /// Left and right gains for the current pan. Both are exactly 1 at center.
    pub fn gains(&self) -> (f32, f32) {
        let boost = 1.0 + self.pan.abs() * LOUDNESS_BOOST;
        let left = if self.pan > 0.0 {
            1.0 - self.pan
        } else {
            boost
        };
        let right = if self.pan < 0.0 {
            1.0 + self.pan
        } else {
            boost
        };
        (left, right)
    }
}

impl Default for PanModifier {
    fn default() -> Self {
        Self::new(DEFAULT_PAN)
    }
}

impl Modifier for PanModifier {
    fn modify(&mut self, buffer: &mut [f32], format: &WaveFormat) -> Result<bool, AudioError> {
        if buffer.is_empty() {
            return Ok(false);
        }
        if format.channels != 2 {
            return Err(AudioError::UnsupportedChannelCount {
                channels: format.channels,
                expected: 2,
            });
        }
        if buffer.len() % 2 != 0 {
            return Err(AudioError::InvalidSampleCount {
                count: buffer.len(),
                channels: 2,
            });
        }

        let (left, right) = self.gains();
        for pair in buffer.chunks_exact_mut(2) {
            pair[0] *= left;
            pair[1] *= right;
        }

        Ok(false)
    }

    fn name(&self) -> &'static str {
        "pan"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::OUTPUT_FORMAT;
    use crate::testutil::assert_close;

    #[test]
    fn test_center_is_unchanged() {
        let mut pan = PanModifier::new(0.0);
        let original = vec![0.1, -0.2, 0.3, -0.4];
        let mut buffer = original.clone();
        assert!(!pan.modify(&mut buffer, &OUTPUT_FORMAT).unwrap());
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_hard_left() {
        let mut pan = PanModifier::new(-1.0);
        let mut buffer = vec![0.5, 0.5];
        pan.modify(&mut buffer, &OUTPUT_FORMAT).unwrap();
        assert_close(buffer[0], 0.5 * SQRT_2);
        assert_eq!(buffer[1], 0.0);
    }

    #[test]
    fn test_partial_right() {
        let mut pan = PanModifier::new(0.5);
        let (left, right) = pan.gains();
        assert_close(left, 0.5);
        assert_close(right, 1.0 + 0.5 * LOUDNESS_BOOST);

        let mut buffer = vec![1.0, 1.0, -1.0, -1.0];
        pan.modify(&mut buffer, &OUTPUT_FORMAT).unwrap();
        assert_close(buffer[2], -left);
        assert_close(buffer[3], -right);
    }

    #[test]
    fn test_rejects_non_stereo() {
        let mut pan = PanModifier::new(0.5);
        let mono = WaveFormat::new(44100, 1).unwrap();
        let mut buffer = vec![1.0; 4];
        assert!(matches!(
            pan.modify(&mut buffer, &mono),
            Err(AudioError::UnsupportedChannelCount {
                channels: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn test_empty_buffer_ignores_format() {
        let mut pan = PanModifier::new(1.0);
        let mono = WaveFormat::new(44100, 1).unwrap();
        let mut buffer: Vec<f32> = Vec::new();
        assert!(!pan.modify(&mut buffer, &mono).unwrap());
    }

    #[test]
    fn test_clamps_and_defaults() {
        assert_eq!(PanModifier::new(2.0).pan(), 1.0);
        assert_eq!(PanModifier::new(-7.0).pan(), -1.0);
        assert_eq!(PanModifier::new(f32::NAN).pan(), DEFAULT_PAN);
    }
}
