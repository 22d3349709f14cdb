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
/// Error types for the audio core
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Invalid sample count {count}: must be a multiple of {channels} channels")]
    InvalidSampleCount { count: usize, channels: u16 },

    #[error("Unsupported channel count {channels}: expected {expected}")]
    UnsupportedChannelCount { channels: u16, expected: u16 },

    #[error("Invalid sample index {index} for a sound of {length} frames")]
    InvalidSampleIndex { index: f64, length: usize },

    #[error("Region {offset}+{count} is outside a buffer of {length} samples")]
    BufferOutOfRange {
        offset: usize,
        count: usize,
        length: usize,
    },

    #[error("Invalid wave format: {0}")]
    InvalidFormat(String),

    #[error("Audio file error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output device error: {0}")]
    Device(String),

    #[error("Audio engine fault: {0}")]
    EngineFault(String),
}
